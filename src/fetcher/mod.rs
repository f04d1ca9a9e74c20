//! Core fetch pipeline.
//!
//! The [`DatasetFetcher`] coordinator plans the shards and supervises a
//! bounded pool of shard workers:
//! - [`provider`] - media provider trait and its HTTP implementation
//! - [`worker`] - per-shard download loop

mod provider;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use provider::{FetchedMedia, HttpMediaProvider, MediaProvider};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Event, RunReport, ShardId};
use crate::{dataset, planner};
use std::sync::Arc;

/// Main pipeline instance (cloneable - all fields are Arc-wrapped)
///
/// Owns the configuration, the media provider, the event broadcast
/// channel, the cancellation token, and the worker-pool semaphore. A run
/// reads the dataset, plans the shards, then keeps at most `max_parallel`
/// shard workers active until the shard list is exhausted.
#[derive(Clone)]
pub struct DatasetFetcher {
    /// Configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    /// Media provider shared by all shard workers
    provider: Arc<dyn MediaProvider>,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Process-wide stop flag, checked cooperatively at row granularity
    cancel_token: tokio_util::sync::CancellationToken,
    /// Semaphore bounding concurrently active shard workers
    concurrent_limit: Arc<tokio::sync::Semaphore>,
}

impl DatasetFetcher {
    /// Create a fetcher with the production HTTP provider.
    ///
    /// The HTTP client is built once and shared by every worker, carrying
    /// the configured per-request timeout and optional User-Agent.
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .connect_timeout(config.fetch_timeout());
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build()?;
        Self::with_provider(config, Arc::new(HttpMediaProvider::new(client)))
    }

    /// Create a fetcher with a custom [`MediaProvider`].
    pub fn with_provider(config: Config, provider: Arc<dyn MediaProvider>) -> Result<Self> {
        config.validate()?;

        // Buffer of 1000 events; slow subscribers observe a Lagged error
        // rather than blocking the pipeline
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        let concurrent_limit = Arc::new(tokio::sync::Semaphore::new(config.max_parallel));

        Ok(Self {
            config: Arc::new(config),
            provider,
            event_tx,
            cancel_token: tokio_util::sync::CancellationToken::new(),
            concurrent_limit,
        })
    }

    /// Subscribe to run events
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. If nobody subscribes, events are silently dropped.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Request a cooperative stop.
    ///
    /// Every shard worker checks the flag between rows: the in-flight
    /// row's bookkeeping completes, no new rows start, and [`run`] returns
    /// once all workers have drained. Safe to call from any task or a
    /// signal handler.
    ///
    /// [`run`]: DatasetFetcher::run
    pub fn request_stop(&self) {
        self.cancel_token.cancel();
    }

    /// Whether a stop has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Emit an event to all subscribers
    fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    /// Run the whole pipeline: read the dataset, plan the shards, and
    /// execute the worker pool.
    ///
    /// Shard-level failures (e.g., an uncreatable output directory) are
    /// counted in the report and emitted as [`Event::ShardFailed`], but do
    /// not fail the run; only configuration, dataset, and planning errors
    /// do, and planning errors abort before any worker starts.
    pub async fn run(&self) -> Result<RunReport> {
        for (dir, key) in [
            (&self.config.image_dir, "image_dir"),
            (&self.config.correspondance_dir, "correspondance_dir"),
        ] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to create {key} '{}': {}", dir.display(), e),
                ))
            })?;
        }

        let rows = dataset::read_rows(&self.config.dataset_path).await?;
        let total_rows = rows.len();
        let shards = planner::plan(
            rows,
            self.config.expected_rows,
            self.config.shard_count,
            &self.config.image_dir,
        )?;

        tracing::info!(
            shards = shards.len(),
            rows = total_rows,
            max_parallel = self.config.max_parallel,
            "starting shard workers"
        );
        self.emit_event(Event::RunStarted {
            shards: shards.len(),
            rows: total_rows,
        });

        let mut handles: Vec<(ShardId, tokio::task::JoinHandle<_>)> =
            Vec::with_capacity(shards.len());
        for shard in shards {
            // Acquire before spawning: at most max_parallel workers are
            // active, and the next pending shard starts as soon as one
            // finishes
            let permit = tokio::select! {
                // Biased so a stop request wins over a free permit
                biased;
                _ = self.cancel_token.cancelled() => break,
                permit = self.concurrent_limit.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let shard_id = shard.id;
            let ctx = worker::ShardWorkerContext {
                shard,
                config: Arc::clone(&self.config),
                provider: Arc::clone(&self.provider),
                event_tx: self.event_tx.clone(),
                cancel_token: self.cancel_token.clone(),
            };
            handles.push((
                shard_id,
                tokio::spawn(async move {
                    let _permit = permit;
                    worker::run_shard_worker(ctx).await
                }),
            ));
        }

        let mut report = RunReport::default();
        for (shard_id, handle) in handles {
            match handle.await {
                Ok(Ok(summary)) => {
                    report.shards_completed += 1;
                    report.totals += summary;
                }
                Ok(Err(e)) => {
                    tracing::error!(shard_id = %shard_id, error = %e, "shard worker failed");
                    self.emit_event(Event::ShardFailed {
                        shard: shard_id,
                        error: e.to_string(),
                    });
                    report.shards_failed += 1;
                }
                Err(e) => {
                    tracing::error!(shard_id = %shard_id, error = %e, "shard worker panicked");
                    self.emit_event(Event::ShardFailed {
                        shard: shard_id,
                        error: e.to_string(),
                    });
                    report.shards_failed += 1;
                }
            }
        }

        report.cancelled = self.cancel_token.is_cancelled();
        if report.cancelled {
            self.emit_event(Event::RunCancelled);
        }
        tracing::info!(
            shards_completed = report.shards_completed,
            shards_failed = report.shards_failed,
            downloaded = report.totals.downloaded,
            skipped = report.totals.skipped,
            failed = report.totals.failed,
            cancelled = report.cancelled,
            "run finished"
        );
        Ok(report)
    }
}
