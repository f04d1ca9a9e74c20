//! # dataset-dl
//!
//! Sharded bulk media downloader for caption/URL datasets.
//!
//! Given a large tab-separated dataset of `(caption, url)` pairs,
//! dataset-dl downloads every URL's content to local storage, sharding the
//! work across a bounded pool of parallel workers, skipping
//! already-downloaded items, inferring file extensions when the URL itself
//! is ambiguous, and recording a provenance mapping from each source row
//! to its final on-disk location (or failure marker).
//!
//! ## Design Philosophy
//!
//! - **Library-first** - no CLI or UI; the embedding application supplies
//!   a parsed [`Config`] and receives a [`RunReport`](types::RunReport)
//! - **Idempotent** - filenames are content-addressed by URL hash, so
//!   re-running a dataset skips everything already on disk
//! - **Degrade, don't abort** - a failed row becomes a sentinel in the
//!   provenance log and processing continues
//! - **Event-driven** - consumers subscribe to per-shard progress events,
//!   no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use dataset_dl::{Config, DatasetFetcher, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         dataset_path: "Train_GCC-training.tsv".into(),
//!         shard_count: 40,
//!         max_parallel: 5,
//!         expected_rows: 3_318_333,
//!         ..Default::default()
//!     };
//!
//!     let fetcher = DatasetFetcher::new(config)?;
//!
//!     // Subscribe to progress events
//!     let mut events = fetcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Run with automatic signal handling
//!     let report = run_with_shutdown(fetcher).await?;
//!     println!("downloaded {} files", report.totals.downloaded);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Dataset loading
pub mod dataset;
/// Error types
pub mod error;
/// Core fetch pipeline (coordinator, shard workers, media provider)
pub mod fetcher;
/// Shard planning
pub mod planner;
/// Provenance logging
pub mod provenance;
/// URL-to-filename resolution
pub mod resolver;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, FetchError, PlanError, Result};
pub use fetcher::{DatasetFetcher, FetchedMedia, HttpMediaProvider, MediaProvider};
pub use provenance::{FAILURE_SENTINEL, ProvenanceRecord, ProvenanceWriter};
pub use resolver::ResolvedTarget;
pub use types::{
    DatasetRow, Event, RowOutcome, RunReport, Shard, ShardId, ShardSummary,
};

/// Helper function to run the fetcher with graceful signal handling.
///
/// Runs the pipeline while listening for a termination signal; on signal,
/// requests a cooperative stop and waits for every worker to drain its
/// in-flight row, so no provenance file is left with a truncated record.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use dataset_dl::{Config, DatasetFetcher, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let fetcher = DatasetFetcher::new(Config::default())?;
///     let report = run_with_shutdown(fetcher).await?;
///     println!("cancelled: {}", report.cancelled);
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(fetcher: DatasetFetcher) -> Result<types::RunReport> {
    let stopper = fetcher.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        stopper.request_stop();
    });
    fetcher.run().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
