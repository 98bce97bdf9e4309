use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use color_eyre::{Result, eyre::eyre};
use serde::{Deserialize, de::DeserializeOwned};

use crate::job::JobSettings;

pub const APP_NAME: &str = "Flux Studio";
pub const DEFAULT_ENDPOINT_ID: &str = "fal-ai/flux-pro/v1.1-ultra";
pub const DEFAULT_QUEUE_URL: &str = "https://queue.fal.run";

/// Non-secret settings. The API credential never goes in here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint_id: String,
    pub queue_base_url: String,
    pub poll_interval_ms: u64,
    /// No ceiling when unset, the job runs until the service resolves it
    pub timeout_secs: Option<u64>,
    pub progress_buffer: usize,
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_id: DEFAULT_ENDPOINT_ID.into(),
            queue_base_url: DEFAULT_QUEUE_URL.into(),
            poll_interval_ms: 500,
            timeout_secs: None,
            progress_buffer: 32,
            download_dir: None,
        }
    }
}

impl Config {
    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            queue_base_url: self.queue_base_url.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn download_dir(&self) -> Result<PathBuf> {
        match &self.download_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::download_dir().map(Ok).unwrap_or_else(data_dir),
        }
    }
}

pub fn load_ron_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let src = fs::read_to_string(path)?;
    Ok(ron::from_str(&src)?)
}

pub fn data_dir() -> Result<PathBuf> {
    Ok(dirs::data_dir()
        .ok_or(eyre!("Couldn't find data dir"))?
        .join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(dirs::config_local_dir()
        .ok_or(eyre!("Couldn't get config dir"))?
        .join("flux_studio.ron"))
}

/// Loads the config file, or the defaults if there is none
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        Ok(Config::default())
    } else {
        load_ron_file(&path)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.ron");
        fs::write(&path, "(timeout_secs: Some(90), poll_interval_ms: 250)").unwrap();

        let cfg: Config = load_ron_file(&path).unwrap();
        assert_eq!(cfg.endpoint_id, DEFAULT_ENDPOINT_ID);
        assert_eq!(cfg.job_settings().timeout, Some(Duration::from_secs(90)));
        assert_eq!(cfg.job_settings().poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn configured_download_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.ron");
        fs::write(
            &path,
            format!("(download_dir: Some({:?}))", dir.path().display().to_string()),
        )
        .unwrap();

        let cfg: Config = load_ron_file(&path).unwrap();
        assert_eq!(
            cfg,
            Config {
                download_dir: Some(dir.path().to_path_buf()),
                ..Default::default()
            }
        );
        assert_eq!(cfg.download_dir().unwrap(), dir.path());
    }
}
