use engine::config::Config;

/// Overrides for values from the config file
#[derive(Debug, clap::Parser)]
pub struct Cli {
    /// Model endpoint the jobs are sent to
    #[arg(short, long)]
    pub endpoint: Option<String>,

    #[arg(long)]
    pub queue_url: Option<String>,

    /// Give up waiting for a job after this many seconds
    #[arg(short, long)]
    pub timeout_secs: Option<u64>,
}

impl Cli {
    pub fn apply(self, mut cfg: Config) -> Config {
        if let Some(endpoint) = self.endpoint {
            cfg.endpoint_id = endpoint;
        }
        if let Some(url) = self.queue_url {
            cfg.queue_base_url = url;
        }
        if self.timeout_secs.is_some() {
            cfg.timeout_secs = self.timeout_secs;
        }
        cfg
    }
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::*;

    #[test]
    fn overrides() {
        let cfg = Cli::parse_from(["flux_studio", "--endpoint", "fal-ai/other", "-t", "30"])
            .apply(Config::default());
        assert_eq!(cfg.endpoint_id, "fal-ai/other");
        assert_eq!(cfg.timeout_secs, Some(30));
        assert_eq!(cfg.queue_base_url, Config::default().queue_base_url);
    }
}
