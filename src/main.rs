use std::process::ExitCode;

use aiakce_sync::config::{self, AppConfig};
use aiakce_sync::error::FetchError;
use aiakce_sync::scraping;
use aiakce_sync::sync::SyncStrategy;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "aiakce-sync")]
#[command(about = "Scrape the aiakce.cz event calendar and sync it into the events table")]
struct Cli {
    /// How previous rows are replaced
    #[arg(long, env = "SYNC_STRATEGY", value_enum, default_value_t = SyncStrategy::Upsert)]
    strategy: SyncStrategy,

    /// Scrape and print the normalized events as JSON without touching the store
    #[arg(long)]
    dry_run: bool,

    /// Log every extracted candidate row and skipped listing
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let dotenv = config::load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = dotenv {
        warn!(error = %err, "failed to read .env file");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(status) = err.downcast_ref::<FetchError>().and_then(FetchError::status) {
                error!(status, "listing page returned a non-success status");
            }
            error!(error = ?err, "scrape failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "info,aiakce_sync=debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = AppConfig::from_env(cli.strategy).context("invalid configuration")?;
    let source = scraping::default_source()?;
    let now = Utc::now();

    if cli.dry_run {
        let harvest = aiakce_sync::harvest(source.as_ref(), now)?;
        println!("{}", serde_json::to_string_pretty(&harvest.outcome.records)?);
        info!(events = harvest.outcome.records.len(), "dry run finished");
        return Ok(());
    }

    let store = aiakce_sync::open_store(&config).context("unable to open event store")?;
    aiakce_sync::ensure_store_reachable(store.as_ref()).context("event store is unreachable")?;

    let summary = aiakce_sync::run(source.as_ref(), store.as_ref(), config.strategy, now)?;
    info!(
        extracted = summary.extracted,
        skipped = summary.skipped,
        block_errors = summary.block_errors,
        persisted = summary.persisted(),
        failed = summary.failed(),
        strategy = %config.strategy,
        "scrape finished"
    );
    Ok(())
}
