//! Static work partitioning
//!
//! Pre-shards an ordered file list across a fixed number of replicas,
//! for runs without a coordinator.

pub mod identity;
pub mod shard;
pub mod splitter;

pub use identity::{resolve_worker_identity, WorkerEnv, WorkerIdentity};
pub use shard::{all_shards, chunk_count, compute_shard, shard_owner, Shard};
pub use splitter::{split, SplitConfig, SplitReport};
