//! Worker loop protocol scenario
//!
//! Records the exact Get/Done sequence a worker produces.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lease_core::coordinator::{CoordinatorConfig, LeaseServer, TokenPool};
use lease_core::worker::{DelayProcessor, LeaseChannel, LoopConfig, StopReason, WorkerLoop, WorkerPhase};
use lease_core::{Ack, Batch, Job, JobId, LeaseError, Result};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Get(Vec<String>),
    Done(String),
}

/// Forwards to an in-process server and records every call
struct Recording {
    server: Arc<LeaseServer>,
    calls: Mutex<Vec<Call>>,
    keys: Mutex<Vec<String>>,
}

#[tonic::async_trait]
impl LeaseChannel for Recording {
    async fn get(&self, job: &Job) -> Result<Batch> {
        let batch = LeaseServer::get(&self.server, job);
        self.calls.lock().push(Call::Get(batch.tokens.clone()));
        self.keys.lock().push(batch.key.to_string());
        Ok(batch)
    }

    async fn done(&self, ack: &Ack) -> Result<Ack> {
        let reply = LeaseServer::done(&self.server, ack)?;
        self.calls.lock().push(Call::Done(ack.key.to_string()));
        Ok(reply)
    }
}

/// Channel whose Done always fails
struct BrokenDone(Arc<LeaseServer>);

#[tonic::async_trait]
impl LeaseChannel for BrokenDone {
    async fn get(&self, job: &Job) -> Result<Batch> {
        Ok(LeaseServer::get(&self.0, job))
    }

    async fn done(&self, _ack: &Ack) -> Result<Ack> {
        Err(LeaseError::ConnectionFailed {
            endpoint: "test".into(),
            reason: "unreachable".into(),
        })
    }
}

fn server(tokens: &[&str]) -> Arc<LeaseServer> {
    let pool = TokenPool::new(tokens.iter().map(|t| t.to_string()).collect());
    Arc::new(LeaseServer::new(CoordinatorConfig::default(), pool))
}

#[tokio::test]
async fn test_get_done_sequence() {
    let channel = Arc::new(Recording {
        server: server(&["x", "y"]),
        calls: Mutex::new(Vec::new()),
        keys: Mutex::new(Vec::new()),
    });
    let job = Job::new(JobId::new("scenario"), NonZeroUsize::MIN);

    let mut worker = WorkerLoop::new(
        channel.clone(),
        DelayProcessor::new(Duration::ZERO),
        job,
        LoopConfig::default(),
    );
    assert_eq!(worker.phase(), WorkerPhase::Running);
    assert_eq!(worker.step().await.unwrap(), WorkerPhase::Running);
    assert_eq!(worker.step().await.unwrap(), WorkerPhase::Running);
    assert_eq!(worker.step().await.unwrap(), WorkerPhase::Done);
    assert_eq!(worker.summary().stop_reason, Some(StopReason::Exhausted));

    let keys = channel.keys.lock().clone();
    assert_eq!(keys.len(), 3);
    assert_ne!(keys[0], keys[1]);
    assert_ne!(keys[1], keys[2]);

    let calls = channel.calls.lock().clone();
    assert_eq!(
        calls,
        vec![
            Call::Get(vec!["x".into()]),
            Call::Done(keys[0].clone()),
            Call::Get(vec!["y".into()]),
            Call::Done(keys[1].clone()),
            Call::Get(vec![]),
            Call::Done(keys[2].clone()),
        ]
    );
}

#[tokio::test]
async fn test_failed_done_is_fatal() {
    let server = server(&["x", "y"]);
    let job = Job::new(JobId::new("broken"), NonZeroUsize::MIN);

    let result = WorkerLoop::new(
        BrokenDone(server.clone()),
        DelayProcessor::new(Duration::ZERO),
        job.clone(),
        LoopConfig::default(),
    )
    .run()
    .await;

    assert!(matches!(result, Err(LeaseError::ConnectionFailed { .. })));
    // The first batch stays leased; there is no automatic recovery
    let status = server.status(&job.id).unwrap();
    assert_eq!(status.outstanding, 1);
    assert_eq!(status.remaining, 1);
}
