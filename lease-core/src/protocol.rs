//! gRPC protocol definitions
//!
//! Generated from `proto/lease.proto`, plus conversions between wire
//! messages and the domain types in [`crate::types`].

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::LeaseError;
use crate::types;

tonic::include_proto!("lease.v1");

/// Validate a wire batch size
pub fn batch_size_from_wire(batch_size: i32) -> Result<NonZeroUsize, LeaseError> {
    usize::try_from(batch_size)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| LeaseError::InvalidRequest {
            reason: format!("batch size must be a positive integer, got {}", batch_size),
        })
}

/// Fails with `InvalidRequest` when the size does not fit the wire's `int32`
pub fn batch_size_to_wire(batch_size: NonZeroUsize) -> Result<i32, LeaseError> {
    i32::try_from(batch_size.get()).map_err(|_| LeaseError::InvalidRequest {
        reason: format!("batch size {} exceeds {}", batch_size, i32::MAX),
    })
}

impl TryFrom<&types::Job> for Job {
    type Error = LeaseError;

    fn try_from(job: &types::Job) -> Result<Self, Self::Error> {
        Ok(Self {
            id: job.id.to_string(),
            batch_size: batch_size_to_wire(job.batch_size)?,
        })
    }
}

impl TryFrom<Job> for types::Job {
    type Error = LeaseError;

    fn try_from(job: Job) -> Result<Self, Self::Error> {
        let batch_size = batch_size_from_wire(job.batch_size)?;
        Ok(types::Job::new(types::JobId::new(job.id), batch_size))
    }
}

impl From<types::Batch> for Batch {
    fn from(batch: types::Batch) -> Self {
        Self {
            key: batch.key.to_string(),
            tokens: batch.tokens,
        }
    }
}

impl From<Batch> for types::Batch {
    fn from(batch: Batch) -> Self {
        Self {
            key: types::BatchKey::new(batch.key),
            tokens: batch.tokens,
        }
    }
}

impl From<&types::Ack> for Ack {
    fn from(ack: &types::Ack) -> Self {
        Self {
            id: ack.id.to_string(),
            key: ack.key.to_string(),
        }
    }
}

impl From<Ack> for types::Ack {
    fn from(ack: Ack) -> Self {
        Self {
            id: types::JobId::new(ack.id),
            key: types::BatchKey::new(ack.key),
        }
    }
}

impl From<types::JobSnapshot> for JobStatus {
    fn from(snapshot: types::JobSnapshot) -> Self {
        Self {
            id: snapshot.id.to_string(),
            remaining: snapshot.remaining as u64,
            outstanding: snapshot.outstanding as u64,
            batches_issued: snapshot.batches_issued,
            batches_confirmed: snapshot.batches_confirmed,
            completed: snapshot.completed,
            elapsed_ms: snapshot.elapsed.as_millis() as u64,
        }
    }
}

impl From<JobStatus> for types::JobSnapshot {
    fn from(status: JobStatus) -> Self {
        Self {
            id: types::JobId::new(status.id),
            remaining: status.remaining as usize,
            outstanding: status.outstanding as usize,
            batches_issued: status.batches_issued,
            batches_confirmed: status.batches_confirmed,
            completed: status.completed,
            elapsed: Duration::from_millis(status.elapsed_ms),
        }
    }
}
