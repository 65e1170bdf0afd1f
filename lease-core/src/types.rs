//! Lease domain types
//!
//! Jobs, batches and acknowledgements exchanged between workers and the
//! coordinator, independent of the wire format.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Caller-generated job identifier, unique per run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random job id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A worker's request for work. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub batch_size: NonZeroUsize,
}

impl Job {
    pub fn new(id: JobId, batch_size: NonZeroUsize) -> Self {
        Self { id, batch_size }
    }
}

/// Opaque key the ledger assigns to each issued batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchKey(String);

impl BatchKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for the `seq`-th batch of a ledger. The sequence prefix keeps keys
    /// unique for the ledger lifetime; the suffix keeps them unguessable.
    pub(crate) fn generate(seq: u64) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{:06x}-{}", seq, &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A keyed group of tokens leased together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub key: BatchKey,
    pub tokens: Vec<String>,
}

impl Batch {
    /// An empty batch is the "no more work" sentinel
    pub fn is_exhausted(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Completion notice for a batch, echoed back by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub id: JobId,
    pub key: BatchKey,
}

impl Ack {
    pub fn for_batch(job: &Job, batch: &Batch) -> Self {
        Self {
            id: job.id.clone(),
            key: batch.key.clone(),
        }
    }
}

/// Point-in-time view of one job's ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub remaining: usize,
    pub outstanding: usize,
    pub batches_issued: u64,
    pub batches_confirmed: u64,
    pub completed: bool,
    pub elapsed: Duration,
}
