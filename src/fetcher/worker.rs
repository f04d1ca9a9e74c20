//! Shard worker: the per-shard unit of work.
//!
//! Iterates its row range in order, resolves each URL to a
//! content-addressed path, performs idempotent downloads, and appends one
//! provenance record per row. Row-level failures degrade to the failure
//! sentinel and the loop continues; only shard-level conditions (output
//! directory or provenance file unusable) abort the worker, and they abort
//! this shard alone.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::provenance::{FAILURE_SENTINEL, ProvenanceRecord, ProvenanceWriter};
use crate::resolver;
use crate::types::{DatasetRow, Event, RowOutcome, Shard, ShardSummary};
use std::sync::Arc;

use super::MediaProvider;

/// Shared context for a single shard worker, reducing parameter passing
/// between helpers.
pub(crate) struct ShardWorkerContext {
    pub(crate) shard: Shard,
    pub(crate) config: Arc<Config>,
    pub(crate) provider: Arc<dyn MediaProvider>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) cancel_token: tokio_util::sync::CancellationToken,
}

impl ShardWorkerContext {
    fn emit(&self, event: Event) {
        // send() fails only when nobody is subscribed, which is fine
        self.event_tx.send(event).ok();
    }
}

/// Run one shard to completion (or until cancellation).
///
/// Returns the shard's row outcome counters. The cancellation token is
/// checked between rows; an in-flight row always gets its provenance
/// record before the worker exits, so the log never ends mid-record.
pub(crate) async fn run_shard_worker(ctx: ShardWorkerContext) -> Result<ShardSummary> {
    let shard_id = ctx.shard.id;

    tokio::fs::create_dir_all(&ctx.shard.output_dir)
        .await
        .map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "failed to create shard output directory '{}': {}",
                    ctx.shard.output_dir.display(),
                    e
                ),
            ))
        })?;

    let mut provenance = ProvenanceWriter::create(
        &ctx.config.correspondance_dir,
        &ctx.config.dataset_stem(),
        shard_id,
    )
    .await
    .map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to create provenance file for shard {shard_id}: {e}"),
        ))
    })?;

    tracing::info!(shard_id = %shard_id, rows = ctx.shard.len(), "shard worker started");
    ctx.emit(Event::ShardStarted {
        shard: shard_id,
        rows: ctx.shard.len(),
    });

    let mut summary = ShardSummary::default();
    for (index, row) in ctx.shard.rows.iter().enumerate() {
        if ctx.cancel_token.is_cancelled() {
            tracing::info!(
                shard_id = %shard_id,
                processed = index,
                "stop requested, ending shard early"
            );
            break;
        }

        let outcome = process_row(&ctx, row).await;
        let location = match &outcome {
            RowOutcome::Downloaded(path) | RowOutcome::AlreadyPresent(path) => {
                path.display().to_string()
            }
            RowOutcome::Failed => FAILURE_SENTINEL.to_string(),
        };
        match outcome {
            RowOutcome::Downloaded(_) => summary.downloaded += 1,
            RowOutcome::AlreadyPresent(_) => summary.skipped += 1,
            RowOutcome::Failed => summary.failed += 1,
        }

        // The record is the row's durable outcome; failing to write it is
        // shard-fatal, not row-recoverable
        provenance
            .append(&ProvenanceRecord {
                caption: row.caption.clone(),
                url: row.url.clone(),
                location,
            })
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to append provenance record for shard {shard_id}: {e}"
                    ),
                ))
            })?;

        ctx.emit(Event::RowFinished {
            shard: shard_id,
            row: index,
            outcome,
        });
    }

    tracing::info!(
        shard_id = %shard_id,
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failed,
        "shard worker finished"
    );
    ctx.emit(Event::ShardFinished {
        shard: shard_id,
        summary,
    });
    Ok(summary)
}

/// Process one row: resolve, probe for prior downloads, fetch, write, and
/// reconcile the extension. Never fails the shard; every error becomes
/// [`RowOutcome::Failed`].
async fn process_row(ctx: &ShardWorkerContext, row: &DatasetRow) -> RowOutcome {
    let target = resolver::resolve(&row.url, &ctx.shard.output_dir);

    if target.extension_confident {
        if path_exists(&target.path).await {
            tracing::debug!(url = %row.url, path = %target.path.display(), "already downloaded");
            return RowOutcome::AlreadyPresent(target.path);
        }
    } else {
        // A prior run may have reconciled this content onto any
        // allow-listed extension
        for candidate in resolver::candidate_paths(&ctx.shard.output_dir, &target.content_hash) {
            if path_exists(&candidate).await {
                tracing::debug!(url = %row.url, path = %candidate.display(), "already downloaded");
                return RowOutcome::AlreadyPresent(candidate);
            }
        }
    }

    let media = match ctx.provider.fetch(&row.url).await {
        Ok(media) => media,
        Err(e) => {
            tracing::warn!(url = %row.url, error = %e, "fetch failed");
            return RowOutcome::Failed;
        }
    };

    if let Err(e) = tokio::fs::write(&target.path, &media.bytes).await {
        tracing::warn!(path = %target.path.display(), error = %e, "failed to write media file");
        return RowOutcome::Failed;
    }

    let mut final_path = target.path.clone();
    if !target.extension_confident
        && let Some(ext) = resolver::reconcile(
            media.content_type.as_deref(),
            media.filename_hint.as_deref(),
        )
        && ext != target.extension
    {
        let corrected = target.with_extension(ext);
        match tokio::fs::rename(&final_path, &corrected).await {
            Ok(()) => final_path = corrected,
            Err(e) => {
                // The payload is safely on disk under the provisional
                // name; keep that rather than degrading to a failure
                tracing::warn!(
                    from = %final_path.display(),
                    to = %corrected.display(),
                    error = %e,
                    "could not rename to reconciled extension, keeping provisional path"
                );
            }
        }
    }

    RowOutcome::Downloaded(final_path)
}

async fn path_exists(path: &std::path::Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
