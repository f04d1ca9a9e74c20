//! Shard planning
//!
//! Partitions the dataset into contiguous shards of near-equal size, one
//! per worker. The arithmetic runs on the *configured* expected row count;
//! the partition consumes the actual rows, and any disagreement between
//! the two is a fatal [`PlanError`], a config or logic problem, not a
//! runtime condition to recover from.

use crate::error::PlanError;
use crate::types::{DatasetRow, Shard, ShardId};
use std::path::Path;

/// Partition `rows` into exactly `shard_count` contiguous shards.
///
/// The first `expected_rows % shard_count` shards receive one extra row,
/// so shard sizes differ by at most one. Each shard is assigned the output
/// subdirectory `image_dir/<shard_id>` (created later, on demand, by its
/// worker). When `expected_rows < shard_count`, trailing shards are empty.
///
/// Fails if the rows run out before every shard reaches its planned size,
/// or if any row is left over afterwards.
pub fn plan(
    rows: Vec<DatasetRow>,
    expected_rows: usize,
    shard_count: usize,
    image_dir: &Path,
) -> Result<Vec<Shard>, PlanError> {
    if shard_count == 0 {
        return Err(PlanError::ZeroShards);
    }

    let base_size = expected_rows / shard_count;
    let remainder = expected_rows % shard_count;

    let mut remaining = rows.into_iter();
    let mut shards = Vec::with_capacity(shard_count);
    for id in 0..shard_count {
        let planned = base_size + usize::from(id < remainder);
        let shard_rows: Vec<DatasetRow> = remaining.by_ref().take(planned).collect();
        if shard_rows.len() != planned {
            return Err(PlanError::ShardUnderfilled {
                shard: id,
                planned,
                actual: shard_rows.len(),
            });
        }
        shards.push(Shard {
            id: ShardId(id),
            rows: shard_rows,
            output_dir: image_dir.join(id.to_string()),
        });
    }

    let leftover = remaining.count();
    if leftover > 0 {
        return Err(PlanError::RowsUnassigned { count: leftover });
    }

    Ok(shards)
}
