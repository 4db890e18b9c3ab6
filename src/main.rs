//! # Fresh News
//!
//! Picks one fresh, not-yet-announced news item per run and hands it to a
//! publisher.
//!
//! ## Usage
//!
//! ```sh
//! fresh_news --config config.yaml
//! ```
//!
//! ## Architecture
//!
//! 1. **Selection**: pick a random feed endpoint from the active source pool
//! 2. **Extraction**: take the newest feed item (or a block of the scraped
//!    fallback page once every pool is spent)
//! 3. **Filtering**: accept only items younger than the age limit that differ
//!    from the last published one
//! 4. **Publishing**: download the image, post the item, remember it, clean up
//!
//! A run that finds nothing fresh ends normally; only configuration problems
//! and failed publishing exit nonzero.

use clap::Parser;
use std::error::Error;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod error;
mod extractors;
mod fetcher;
mod filter;
mod image;
mod models;
mod orchestrator;
mod publisher;
mod selector;
mod state;
mod utils;

use cli::Cli;
use config::{LoggingSettings, Settings};
use error::RunError;
use fetcher::HttpFetcher;
use filter::SystemClock;
use orchestrator::{Orchestrator, Outcome};
use publisher::LogPublisher;
use state::{JsonFileStore, MemoryStore, StateStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    let settings = Settings::load(&args.config)?;
    init_tracing(&settings.logging)?;

    let start_time = std::time::Instant::now();
    info!(config = %args.config.display(), dry_run = args.dry_run, "fresh_news starting up");

    let fetcher = HttpFetcher::new(settings.fetch.timeout())?;
    let file_store = JsonFileStore::new(&settings.state.path);
    info!(
        sources = settings.sources().len(),
        pools = ?settings.selection.primary_pools,
        age_limit_days = settings.news_age_limit_days(),
        state = %file_store.path().display(),
        "Configuration loaded"
    );

    let run = async {
        if args.dry_run {
            let store = match file_store.load().await {
                Some(record) => MemoryStore::with_record(record),
                None => MemoryStore::default(),
            };
            select_and_publish(&settings, &fetcher, &store).await
        } else {
            select_and_publish(&settings, &fetcher, &file_store).await
        }
    };

    let result = tokio::select! {
        result = run => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted");
            return Ok(());
        }
    };

    let elapsed = start_time.elapsed();
    match result {
        Ok(Outcome::Accepted(item)) => {
            info!(?elapsed, guid = %item.guid, title = %item.title, "Execution complete");
            Ok(())
        }
        Ok(Outcome::NoFreshNews) => {
            info!(?elapsed, "Execution complete; no fresh news today");
            Ok(())
        }
        Err(e) => {
            error!(?elapsed, error = %e, "Run failed");
            Err(e.into())
        }
    }
}

#[instrument(level = "info", skip_all)]
async fn select_and_publish<S: StateStore>(
    settings: &Settings,
    fetcher: &HttpFetcher,
    store: &S,
) -> Result<Outcome, RunError> {
    let clock = SystemClock;
    let publisher = LogPublisher;
    let mut orchestrator = Orchestrator::new(settings, fetcher, store, &clock, &publisher)?;
    orchestrator.run().await
}

/// Stdout logging plus an optional plain-text log file.
fn init_tracing(logging: &LoggingSettings) -> Result<(), Box<dyn Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let stdout = tfmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339());

    let file = match &logging.file_path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tfmt::layer()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .init();
    Ok(())
}
