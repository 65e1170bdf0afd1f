//! Lease Core - token leasing for parallel file workers
//!
//! This crate provides:
//! - A coordinator that leases fixed-size batches of tokens per job
//! - A worker loop that pulls, processes and confirms batches
//! - Static contiguous sharding for runs without a coordinator

pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod partition;
pub mod protocol;
pub mod runtime;
pub mod types;
pub mod worker;

pub use coordinator::{CoordinatorConfig, LeaseServer, TokenLedger};
pub use error::{LeaseError, Result};
pub use partition::{compute_shard, resolve_worker_identity, Shard};
pub use types::{Ack, Batch, BatchKey, Job, JobId};
pub use worker::{LeaseChannel, WorkerLoop, WorkerPhase};

/// Default coordinator gRPC port
pub const DEFAULT_PORT: u16 = 7001;

/// Default metrics port
pub const DEFAULT_METRICS_PORT: u16 = 9100;
