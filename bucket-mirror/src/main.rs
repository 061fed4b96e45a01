//! Bucket Mirror - Main entry point
//!
//! Mirrors local directories into object-storage buckets on cron schedules.

use anyhow::Result;
use bucket_mirror::daemon::{Mirror, ShutdownSignal};
use bucket_mirror::scheduler::TokioCronScheduler;
use bucket_mirror::storage::S3Store;
use bucket_mirror::{utils, Config};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "CONFIG_PATH",
        default_value = "config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting bucket-mirror v{} ({} buckets, config: {})",
        env!("CARGO_PKG_VERSION"),
        config.buckets.len(),
        args.config.display()
    );

    let shutdown = ShutdownSignal::install()?;
    let store = S3Store::connect(&config.credentials, &config.remote).await?;
    let scheduler = TokioCronScheduler::new(config.scheduler.timezone).await?;

    let report = Mirror::new(config, Arc::new(store), Arc::new(scheduler))
        .run(shutdown.wait())
        .await?;

    tracing::info!(
        registered_tasks = report.schedule.registered.len(),
        uploaded = report.uploads.uploaded,
        failed = report.uploads.open_failed + report.uploads.upload_failed,
        "Shutdown complete"
    );

    Ok(())
}
