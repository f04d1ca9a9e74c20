//! Provenance logging
//!
//! One append-only, tab-separated file per shard, correlating every input
//! row with its outcome: the final on-disk path, or [`FAILURE_SENTINEL`]
//! when the fetch failed. Records are flushed after every append so that
//! partial progress survives an interrupted process with no truncated
//! lines.

use crate::types::ShardId;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Marker written in place of a path when a row's fetch failed.
///
/// A failed row is retried in a future run by re-feeding the whole
/// dataset; the sentinel itself carries no resume state.
pub const FAILURE_SENTINEL: &str = "<failed>";

/// One provenance log entry: the input row plus where its content ended up
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvenanceRecord {
    /// Caption text from the dataset row
    pub caption: String,
    /// Original URL from the dataset row
    pub url: String,
    /// Final path string, or [`FAILURE_SENTINEL`]
    pub location: String,
}

/// Append-only writer for one shard's provenance file.
///
/// The file lives at `dir/<dataset_stem>.part-<shard_id>.tsv` and is
/// truncated at creation: a re-run rewrites the shard's log from scratch
/// while skipping already-downloaded content.
pub struct ProvenanceWriter {
    file: tokio::fs::File,
    path: PathBuf,
}

impl ProvenanceWriter {
    /// Create (truncating) the provenance file for a shard
    pub async fn create(dir: &Path, dataset_stem: &str, shard: ShardId) -> std::io::Result<Self> {
        let path = dir.join(format!("{dataset_stem}.part-{shard}.tsv"));
        let file = tokio::fs::File::create(&path).await?;
        Ok(Self { file, path })
    }

    /// Path of the underlying provenance file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it to disk.
    ///
    /// Fields are tab-separated in fixed `(caption, url, location)` order,
    /// newline-terminated. Embedded delimiters inside a field are escaped
    /// to spaces first; a caption must never be able to break the
    /// one-record-per-line framing.
    pub async fn append(&mut self, record: &ProvenanceRecord) -> std::io::Result<()> {
        let line = format!(
            "{}\t{}\t{}\n",
            sanitize_field(&record.caption),
            sanitize_field(&record.url),
            sanitize_field(&record.location),
        );
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await
    }
}

/// Replace record and field delimiters embedded in a field with spaces
fn sanitize_field(field: &str) -> Cow<'_, str> {
    if field.contains(['\t', '\n', '\r']) {
        Cow::Owned(field.replace(['\t', '\n', '\r'], " "))
    } else {
        Cow::Borrowed(field)
    }
}
