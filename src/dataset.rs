//! Dataset loading
//!
//! The input is a tab-separated file with two logical columns
//! `(caption, url)` and no header row. Rows are loaded once, in file
//! order; that order defines the row index used for shard membership.

use crate::error::{Error, Result};
use crate::types::DatasetRow;
use std::path::Path;

/// Read all rows from a tab-separated `(caption, url)` file.
///
/// The first field is the caption, the second the URL; any further fields
/// are ignored. A line without a tab yields a row with an empty URL, which
/// downstream degrades to a failure-sentinel provenance entry, so the
/// one-record-per-input-row accounting stays intact either way. Empty
/// lines are skipped.
pub async fn read_rows(path: &Path) -> Result<Vec<DatasetRow>> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read dataset '{}': {}", path.display(), e),
        ))
    })?;

    let mut rows = Vec::new();
    for line in contents.lines() {
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let caption = fields.next().unwrap_or("").to_string();
        let url = fields.next().unwrap_or("").to_string();
        rows.push(DatasetRow { caption, url });
    }
    Ok(rows)
}
