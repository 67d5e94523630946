//! NWP field extraction service.
//!
//! Runs one configured extraction end to end:
//! - Fetches native model files from the archive with scheduled retries
//! - Clips declared variables to the configured domain and caches them
//! - Derives the configured output variables per (run, term) step
//! - Concatenates steps into grouped artifacts (daily/monthly/per-run)

mod config;
mod runner;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use archive_client::{HttpArchive, LogNotifier, RetryPolicy};
use staging::JsonDatasetFormat;

use config::ExtractionConfig;
use runner::ExtractionRunner;

#[derive(Parser, Debug)]
#[command(name = "extractor")]
#[command(about = "NWP field extraction from a remote model archive")]
struct Args {
    /// Extraction configuration file (YAML)
    #[arg(short, long, env = "EXTRACTION_CONFIG")]
    config: PathBuf,

    /// Working directory for staged and final artifacts
    #[arg(long, env = "EXTRACTION_WORKDIR", default_value = "/data/extract")]
    workdir: PathBuf,

    /// Fail on missing native files instead of fetching them
    #[arg(long)]
    no_fetch: bool,

    /// Skip the retry schedule and fail fetches on the first error
    #[arg(long)]
    no_retry: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting NWP field extractor");

    let mut config = ExtractionConfig::load(&args.config)?;
    if args.no_fetch {
        config.extraction.autofetch = false;
    }

    tokio::fs::create_dir_all(&args.workdir)
        .await
        .with_context(|| format!("Failed to create workdir: {}", args.workdir.display()))?;

    let archive = Arc::new(HttpArchive::new().context("Failed to build archive client")?);
    let policy = if args.no_retry {
        RetryPolicy::none()
    } else {
        RetryPolicy::operational()
    };

    let mut runner = ExtractionRunner::open(
        &config,
        &args.workdir,
        archive,
        Arc::new(LogNotifier),
        policy,
        Arc::new(JsonDatasetFormat::new()),
    )
    .await
    .context("Failed to assemble extraction pipeline")?;

    let summary = runner
        .run(&config.steps())
        .await
        .context("Extraction run failed")?;

    info!(
        steps = summary.steps,
        groups = summary.groups,
        "Extraction session complete"
    );

    Ok(())
}
