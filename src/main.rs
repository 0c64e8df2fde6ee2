//! headway: a service that batches landed transit feed files for conversion.
//!
//! Watches an incoming object-storage bucket for real-time transit feed
//! files, groups them into bounded batches per feed type, dispatches each
//! batch to an external conversion function, and records every file seen
//! in a shared metadata log, exactly once.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use headway::Config;
use headway::error::{AddressParseSnafu, ConfigSnafu, IngestError, MetricsSnafu};
use headway::{metrics, run_ingestion};

/// Transit feed ingestion batching service.
#[derive(Parser, Debug)]
#[command(name = "headway")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without processing.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), IngestError> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("headway starting");

    let config = Config::from_file(&args.config).context(ConfigSnafu)?;

    // Initialize metrics if enabled
    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        metrics::init(addr).context(MetricsSnafu)?;
        debug!(
            "Metrics endpoint listening on http://{}/metrics",
            config.metrics.address
        );
    }

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("Source: {}", config.source.url);
        info!(
            "Incoming prefix: {}",
            config.source.prefix.as_deref().unwrap_or("<bucket root>")
        );
        info!("Batch threshold: {} bytes", config.source.batch_threshold);
        info!(
            "Conversion function: {}",
            config
                .dispatch
                .function_url
                .as_deref()
                .unwrap_or("<unconfigured>")
        );
        info!("Configuration is valid");
        return Ok(());
    }

    let summary = run_ingestion(config).await?;

    info!("Ingestion stopped cleanly");
    info!("  Metadata inserts: {}", summary.good_insert);
    info!("  Failed inserts: {}", summary.bad_insert);

    Ok(())
}
