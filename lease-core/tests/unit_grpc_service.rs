//! End-to-end tests over a real gRPC connection
//!
//! Each test binds the coordinator to an ephemeral local port.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use lease_core::coordinator::{CoordinatorConfig, LeaseServer};
use lease_core::protocol::tokens_client::TokensClient;
use lease_core::protocol::tokens_server::TokensServer;
use lease_core::protocol as pb;
use lease_core::runtime::ShutdownSignal;
use lease_core::worker::{
    ClientConfig, CoordinatorClient, CopyProcessor, LeaseChannel, LoopConfig, StopReason, WorkerLoop,
};
use lease_core::{Ack, Job, JobId, LeaseError};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

struct Harness {
    addr: String,
    shutdown: ShutdownSignal,
    handle: JoinHandle<Result<(), tonic::transport::Error>>,
}

impl Harness {
    async fn start(token_dir: &Path) -> Self {
        let config = CoordinatorConfig {
            token_dir: token_dir.to_path_buf(),
            ..Default::default()
        };
        let server = Arc::new(LeaseServer::from_dir(config).await.unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        let shutdown = ShutdownSignal::new();
        let signal = shutdown.clone();
        let handle = tokio::spawn(
            Server::builder()
                .add_service(TokensServer::from_arc(server))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                    signal.wait().await
                }),
        );

        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn client(&self) -> CoordinatorClient {
        CoordinatorClient::connect(ClientConfig {
            coordinator_addr: self.addr.clone(),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    async fn stop(self) {
        self.shutdown.shutdown();
        self.handle.await.unwrap().unwrap();
    }
}

fn populate(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), name.as_bytes()).unwrap();
    }
}

#[tokio::test]
async fn test_worker_copies_every_file() {
    let source = tempfile::tempdir().unwrap();
    let destination = tempfile::tempdir().unwrap();
    populate(source.path(), &["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"]);

    let harness = Harness::start(source.path()).await;
    let client = harness.client().await;

    let job = Job::new(JobId::new("copy-job"), NonZeroUsize::new(2).unwrap());
    let processor = CopyProcessor::new(source.path(), destination.path()).await.unwrap();
    let summary = WorkerLoop::new(client.clone(), processor, job.clone(), LoopConfig::default())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.tokens_processed, 5);
    assert_eq!(summary.stop_reason, Some(StopReason::Exhausted));
    for name in ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"] {
        assert_eq!(
            std::fs::read(destination.path().join(name)).unwrap(),
            name.as_bytes()
        );
    }

    let status = client.status(&job.id).await.unwrap().unwrap();
    assert!(status.completed);
    assert_eq!(status.outstanding, 0);
    assert_eq!(status.batches_confirmed, 4);

    harness.stop().await;
}

#[tokio::test]
async fn test_non_positive_batch_size_rejected() {
    let source = tempfile::tempdir().unwrap();
    populate(source.path(), &["a.jpg"]);
    let harness = Harness::start(source.path()).await;

    let mut raw = TokensClient::connect(harness.addr.clone()).await.unwrap();
    for batch_size in [0, -3] {
        let status = raw
            .get(pb::Job {
                id: "bad".into(),
                batch_size,
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    // The rejected requests never created a ledger
    let client = harness.client().await;
    assert!(client.status(&JobId::new("bad")).await.unwrap().is_none());

    harness.stop().await;
}

#[tokio::test]
async fn test_duplicate_done_is_unknown_key() {
    let source = tempfile::tempdir().unwrap();
    populate(source.path(), &["a.jpg", "b.jpg"]);
    let harness = Harness::start(source.path()).await;
    let client = harness.client().await;

    let job = Job::new(JobId::new("dup"), NonZeroUsize::MIN);
    let batch = client.get(&job).await.unwrap();
    assert_eq!(batch.tokens, vec!["a.jpg"]);

    let ack = Ack::for_batch(&job, &batch);
    let reply = client.done(&ack).await.unwrap();
    assert_eq!(reply.id, job.id);

    let err = client.done(&ack).await.unwrap_err();
    assert!(matches!(err, LeaseError::UnknownKey { .. }));
    assert!(err.is_protocol_violation());

    harness.stop().await;
}

#[tokio::test]
async fn test_admin_operations() {
    let source = tempfile::tempdir().unwrap();
    populate(source.path(), &["a.jpg", "b.jpg", "c.jpg"]);
    let harness = Harness::start(source.path()).await;
    let client = harness.client().await;

    assert_eq!(client.show().await.unwrap(), vec!["a.jpg", "b.jpg", "c.jpg"]);

    let job = Job::new(JobId::new("admin"), NonZeroUsize::MIN);
    client.get(&job).await.unwrap();
    assert!(client.status(&job.id).await.unwrap().is_some());

    assert_eq!(client.reset().await.unwrap(), 3);
    assert!(client.status(&job.id).await.unwrap().is_none());

    assert_eq!(client.shuffle().await.unwrap(), 3);
    let mut shuffled = client.show().await.unwrap();
    shuffled.sort();
    assert_eq!(shuffled, vec!["a.jpg", "b.jpg", "c.jpg"]);

    populate(source.path(), &["d.jpg"]);
    assert_eq!(client.rescan().await.unwrap(), 4);
    assert_eq!(client.show().await.unwrap().len(), 4);

    harness.stop().await;
}

#[tokio::test]
async fn test_unreachable_coordinator() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = CoordinatorClient::connect(ClientConfig {
        coordinator_addr: addr,
        ..Default::default()
    })
    .await;
    assert!(matches!(result, Err(LeaseError::ConnectionFailed { .. })));
}
