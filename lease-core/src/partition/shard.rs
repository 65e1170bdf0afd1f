//! Deterministic contiguous sharding
//!
//! Splits an ordered item list into `ceil(total / replicas)`-sized chunks.
//! Every worker computes the same boundaries from the same inputs, so no
//! coordination is needed.

use std::ops::Range;

use tracing::debug;

use crate::error::{LeaseError, Result};

/// Half-open slice `[start, end)` of the ordered item list owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub worker_index: usize,
    pub start: usize,
    pub end: usize,
}

impl Shard {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Items of `items` falling in this shard
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.range()]
    }
}

fn chunk_length(total_items: usize, replica_count: usize) -> usize {
    total_items.div_ceil(replica_count)
}

/// Number of chunks `total_items` splits into for `replica_count` workers.
///
/// Can be lower than `replica_count`: 5 items over 4 replicas gives chunks
/// of 2 and only 3 of them.
pub fn chunk_count(total_items: usize, replica_count: usize) -> usize {
    if total_items == 0 || replica_count == 0 {
        return 0;
    }
    total_items.div_ceil(chunk_length(total_items, replica_count))
}

/// Compute the shard owned by `worker_index`.
///
/// Fails with [`LeaseError::ShardOutOfRange`] when the index has no chunk,
/// which includes every index when `total_items` is zero.
pub fn compute_shard(total_items: usize, replica_count: usize, worker_index: usize) -> Result<Shard> {
    if replica_count == 0 {
        return Err(LeaseError::InvalidRequest {
            reason: "replica count must be at least 1".into(),
        });
    }

    let chunks = chunk_count(total_items, replica_count);
    if worker_index >= chunks {
        return Err(LeaseError::ShardOutOfRange {
            worker_index,
            chunk_count: chunks,
            total_items,
            replica_count,
        });
    }

    let length = chunk_length(total_items, replica_count);
    let start = worker_index * length;
    let end = start.saturating_add(length).min(total_items);

    debug!(
        worker_index,
        start, end, total_items, replica_count, "Computed shard"
    );

    Ok(Shard {
        worker_index,
        start,
        end,
    })
}

/// All shards for a given split, in worker order
pub fn all_shards(total_items: usize, replica_count: usize) -> Result<Vec<Shard>> {
    (0..chunk_count(total_items, replica_count))
        .map(|index| compute_shard(total_items, replica_count, index))
        .collect()
}

/// Worker index owning `item_index`, if the item exists
pub fn shard_owner(item_index: usize, total_items: usize, replica_count: usize) -> Option<usize> {
    if item_index >= total_items || replica_count == 0 {
        return None;
    }
    Some(item_index / chunk_length(total_items, replica_count))
}
