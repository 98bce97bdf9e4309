use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use engine::{
    AspectRatio, CredentialResolver, FormState, ManualEntry, OutputFormat, Pipeline,
    SafetyTolerance, Status,
    config::load_config,
    job::progress_channel,
};
use tokio_stream::StreamExt;

/// Generates one image and writes it to disk
#[derive(clap::Parser)]
struct Cli {
    prompt: String,

    #[arg(short, long, default_value = "16:9")]
    aspect_ratio: AspectRatio,

    #[arg(short, long, default_value = "jpeg")]
    format: OutputFormat,

    /// 1 (strictest) to 6
    #[arg(short, long, default_value_t = 2)]
    safety_tolerance: u8,

    #[arg(long)]
    no_safety_checker: bool,

    #[arg(long)]
    raw: bool,

    #[arg(long)]
    seed: Option<u32>,

    /// Target directory, defaults to the configured download dir
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();
    color_eyre::install()?;
    let args = Cli::parse();

    let mut cfg = load_config()?;
    if args.timeout_secs.is_some() {
        cfg.timeout_secs = args.timeout_secs;
    }

    let form = FormState {
        prompt: args.prompt,
        enable_safety_checker: !args.no_safety_checker,
        safety_tolerance: SafetyTolerance::try_new(args.safety_tolerance)?,
        output_format: args.format,
        aspect_ratio: args.aspect_ratio,
        raw: args.raw,
        use_seed: args.seed.is_some(),
        seed: args.seed.map(|s| s.to_string()).unwrap_or_default(),
    };

    // there is no interactive entry here, so only configured secrets work
    let pipeline = Pipeline::new(&cfg, CredentialResolver::from_env());
    let job = pipeline.prepare(&form, &ManualEntry::default())?;

    println!("{}", Status::Submitting.message());
    let (tx, mut updates) = progress_channel(cfg.progress_buffer);
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.next().await {
            match update.queue_position {
                Some(pos) if update.logs.is_empty() => println!("Waiting in queue (position {pos})"),
                _ => update.logs.iter().for_each(|line| println!("{line}")),
            }
        }
    });

    let outcome = pipeline.execute(job, tx).await?;
    printer.await?;

    println!("{}", Status::Succeeded.message());
    for (label, value) in outcome.summary.rows() {
        println!("{label}: {value}");
    }

    let dir = match args.out {
        Some(dir) => dir,
        None => cfg.download_dir()?,
    };
    let path = outcome.rendered.download.save_into(&dir)?;
    println!("Saved {}", path.display());

    Ok(())
}
