//! Request/response channel between a worker and the lease server
//!
//! Implemented by the gRPC [`CoordinatorClient`](super::CoordinatorClient)
//! and, in-process, by [`LeaseServer`](crate::coordinator::LeaseServer).

use std::sync::Arc;

use crate::error::Result;
use crate::types::{Ack, Batch, Job};

#[tonic::async_trait]
pub trait LeaseChannel: Send + Sync {
    /// Lease the next batch for `job`
    async fn get(&self, job: &Job) -> Result<Batch>;

    /// Confirm the batch named by `ack`
    async fn done(&self, ack: &Ack) -> Result<Ack>;
}

#[tonic::async_trait]
impl<T: LeaseChannel + ?Sized> LeaseChannel for Arc<T> {
    async fn get(&self, job: &Job) -> Result<Batch> {
        (**self).get(job).await
    }

    async fn done(&self, ack: &Ack) -> Result<Ack> {
        (**self).done(ack).await
    }
}
