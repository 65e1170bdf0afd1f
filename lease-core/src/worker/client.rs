//! Coordinator client for workers
//!
//! gRPC client wrapper for worker-coordinator communication.

use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::{debug, info};

use super::channel::LeaseChannel;
use crate::error::{LeaseError, Result};
use crate::protocol as pb;
use crate::protocol::tokens_client::TokensClient;
use crate::types::{Ack, Batch, Job, JobId, JobSnapshot};

/// Configuration for coordinator client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Coordinator address
    pub coordinator_addr: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            coordinator_addr: format!("http://127.0.0.1:{}", crate::DEFAULT_PORT),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Map a failed call back into the lease error taxonomy
fn from_status(status: Status, ack: Option<&Ack>) -> LeaseError {
    match (status.code(), ack) {
        (Code::NotFound, Some(ack)) => LeaseError::UnknownKey {
            job_id: ack.id.to_string(),
            key: ack.key.to_string(),
        },
        (Code::InvalidArgument, _) => LeaseError::InvalidRequest {
            reason: status.message().to_string(),
        },
        (code, _) => LeaseError::Rpc {
            code,
            message: status.message().to_string(),
        },
    }
}

/// Coordinator client for workers and admin tooling
#[derive(Clone)]
pub struct CoordinatorClient {
    config: ClientConfig,
    client: TokensClient<Channel>,
}

impl CoordinatorClient {
    /// Connect to the coordinator
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        info!("Connecting to coordinator at {}", config.coordinator_addr);

        let connection_failed = |reason: String| LeaseError::ConnectionFailed {
            endpoint: config.coordinator_addr.clone(),
            reason,
        };

        let channel = Endpoint::from_shared(config.coordinator_addr.clone())
            .map_err(|e| connection_failed(e.to_string()))?
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .connect()
            .await
            .map_err(|e| connection_failed(e.to_string()))?;

        Ok(Self {
            client: TokensClient::new(channel),
            config,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.coordinator_addr
    }

    /// Drop every job ledger on the coordinator
    pub async fn reset(&self) -> Result<u64> {
        let reply = self
            .client
            .clone()
            .reset(pb::Empty {})
            .await
            .map_err(|s| from_status(s, None))?;
        Ok(reply.into_inner().n)
    }

    /// Re-read the coordinator's token directory
    pub async fn rescan(&self) -> Result<u64> {
        let reply = self
            .client
            .clone()
            .rescan(pb::Empty {})
            .await
            .map_err(|s| from_status(s, None))?;
        Ok(reply.into_inner().n)
    }

    /// Shuffle the coordinator's token pool
    pub async fn shuffle(&self) -> Result<u64> {
        let reply = self
            .client
            .clone()
            .shuffle(pb::Empty {})
            .await
            .map_err(|s| from_status(s, None))?;
        Ok(reply.into_inner().n)
    }

    /// List the coordinator's token pool
    pub async fn show(&self) -> Result<Vec<String>> {
        let reply = self
            .client
            .clone()
            .show(pb::Empty {})
            .await
            .map_err(|s| from_status(s, None))?;
        Ok(reply.into_inner().tokens)
    }

    /// Snapshot of one job; `None` if the coordinator has no ledger for it
    pub async fn status(&self, id: &JobId) -> Result<Option<JobSnapshot>> {
        let request = pb::JobRef { id: id.to_string() };
        match self.client.clone().status(request).await {
            Ok(reply) => Ok(Some(reply.into_inner().into())),
            Err(status) if status.code() == Code::NotFound => Ok(None),
            Err(status) => Err(from_status(status, None)),
        }
    }
}

#[tonic::async_trait]
impl LeaseChannel for CoordinatorClient {
    async fn get(&self, job: &Job) -> Result<Batch> {
        debug!(job_id = %job.id, batch_size = job.batch_size.get(), "requesting job tokens");
        let reply = self
            .client
            .clone()
            .get(pb::Job::try_from(job)?)
            .await
            .map_err(|s| from_status(s, None))?;
        Ok(reply.into_inner().into())
    }

    async fn done(&self, ack: &Ack) -> Result<Ack> {
        debug!(job_id = %ack.id, key = %ack.key, "send done signal to server");
        let reply = self
            .client
            .clone()
            .done(pb::Ack::from(ack))
            .await
            .map_err(|s| from_status(s, Some(ack)))?;
        Ok(reply.into_inner().into())
    }
}
