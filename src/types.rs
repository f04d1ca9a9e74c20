//! Core types and events for dataset-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a shard
///
/// Shard ids are dense, starting at 0, assigned in input-file order by the
/// planner. The id doubles as the name of the shard's output subdirectory.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ShardId(pub usize);

impl ShardId {
    /// Create a new ShardId
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the inner usize value
    pub fn get(&self) -> usize {
        self.0
    }
}

impl From<usize> for ShardId {
    fn from(id: usize) -> Self {
        Self(id)
    }
}

impl From<ShardId> for usize {
    fn from(id: ShardId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the input dataset: a caption and the URL it describes.
///
/// Rows are read once, in file order. File order defines the row index,
/// which in turn determines shard membership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    /// Caption text for the media item
    pub caption: String,
    /// Source URL of the media item
    pub url: String,
}

/// A contiguous, non-overlapping partition of the input rows, owned by
/// exactly one worker.
///
/// Concatenating all shards' rows in id order reconstructs the original
/// row sequence exactly. A shard may be empty only when the dataset has
/// fewer rows than the shard count.
#[derive(Clone, Debug)]
pub struct Shard {
    /// Shard id (also names the output subdirectory)
    pub id: ShardId,
    /// Rows assigned to this shard, in original input order
    pub rows: Vec<DatasetRow>,
    /// Directory this shard's media files are written to
    pub output_dir: PathBuf,
}

impl Shard {
    /// Number of rows assigned to this shard
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether this shard has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of processing a single dataset row
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowOutcome {
    /// The URL was fetched and its content written to this path
    Downloaded(PathBuf),
    /// The content was already on disk from a prior run (or an earlier
    /// duplicate row), no network I/O performed
    AlreadyPresent(PathBuf),
    /// The fetch failed; the provenance log carries the failure sentinel
    Failed,
}

/// Per-shard row outcome counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ShardSummary {
    /// Rows whose content was downloaded this run
    pub downloaded: u64,
    /// Rows skipped because the content was already on disk
    pub skipped: u64,
    /// Rows that failed and were recorded with the failure sentinel
    pub failed: u64,
}

impl std::ops::AddAssign for ShardSummary {
    fn add_assign(&mut self, other: Self) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Final accounting for one pipeline run, returned by
/// [`DatasetFetcher::run`](crate::DatasetFetcher::run).
///
/// Shard failures do not fail the run at the process level; they are
/// counted here and surfaced as [`Event::ShardFailed`].
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct RunReport {
    /// Shards whose worker ran to completion
    pub shards_completed: usize,
    /// Shards whose worker aborted (e.g., output directory not creatable)
    pub shards_failed: usize,
    /// Whether a stop request interrupted the run
    pub cancelled: bool,
    /// Row outcome totals across all completed shards
    pub totals: ShardSummary,
}

/// Events emitted during a run
///
/// Subscribe via [`DatasetFetcher::subscribe`](crate::DatasetFetcher::subscribe).
/// Events are broadcast; if nobody is subscribed they are silently dropped.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Planning succeeded and workers are about to start
    RunStarted {
        /// Number of shards planned
        shards: usize,
        /// Total number of dataset rows
        rows: usize,
    },

    /// A shard worker began processing
    ShardStarted {
        /// Shard id
        shard: ShardId,
        /// Rows assigned to the shard
        rows: usize,
    },

    /// One row finished processing (in-shard row order)
    RowFinished {
        /// Shard id
        shard: ShardId,
        /// Zero-based row index within the shard
        row: usize,
        /// What happened to the row
        outcome: RowOutcome,
    },

    /// A shard worker finished its loop (including an early cancelled exit)
    ShardFinished {
        /// Shard id
        shard: ShardId,
        /// Row outcome counters for the shard
        summary: ShardSummary,
    },

    /// A shard worker aborted; its remaining rows were not processed
    ShardFailed {
        /// Shard id
        shard: ShardId,
        /// Error message
        error: String,
    },

    /// A stop request was observed; workers drained their in-flight rows
    RunCancelled,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_id_displays_as_bare_integer() {
        assert_eq!(ShardId(7).to_string(), "7");
        assert_eq!(usize::from(ShardId::new(7)), 7);
    }

    #[test]
    fn shard_summary_accumulates() {
        let mut total = ShardSummary::default();
        total += ShardSummary {
            downloaded: 2,
            skipped: 1,
            failed: 0,
        };
        total += ShardSummary {
            downloaded: 1,
            skipped: 0,
            failed: 3,
        };
        assert_eq!(
            total,
            ShardSummary {
                downloaded: 3,
                skipped: 1,
                failed: 3,
            }
        );
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::ShardStarted {
            shard: ShardId(2),
            rows: 10,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "shard_started");
        assert_eq!(json["shard"], 2);
        assert_eq!(json["rows"], 10);
    }
}
