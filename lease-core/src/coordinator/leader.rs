//! Lease server
//!
//! Owns the token pool and one ledger per job behind a single mutex, and
//! exposes Get/Done plus the admin operations over gRPC.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use super::ledger::TokenLedger;
use super::pool::TokenPool;
use crate::error::{LeaseError, Result};
use crate::metrics::standard;
use crate::protocol as pb;
use crate::protocol::tokens_server::Tokens;
use crate::runtime::ShutdownSignal;
use crate::types::{Ack, Batch, Job, JobId, JobSnapshot};
use crate::worker::LeaseChannel;

/// Configuration for the lease server
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Directory scanned for tokens
    pub token_dir: PathBuf,
    /// Job ledgers older than this are dropped by the reaper
    pub job_retention: Duration,
    /// How often the reaper runs
    pub reap_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            token_dir: PathBuf::from("/tf/images"),
            job_retention: Duration::from_secs(24 * 60 * 60),
            reap_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Ledger plus bookkeeping for one job
struct JobEntry {
    ledger: TokenLedger,
    created_at: Instant,
    /// Set once the ledger first drains
    completed_after: Option<Duration>,
}

impl JobEntry {
    fn snapshot(&self, id: &JobId) -> JobSnapshot {
        JobSnapshot {
            id: id.clone(),
            remaining: self.ledger.remaining(),
            outstanding: self.ledger.outstanding(),
            batches_issued: self.ledger.batches_issued(),
            batches_confirmed: self.ledger.batches_confirmed(),
            completed: self.completed_after.is_some(),
            elapsed: self
                .completed_after
                .unwrap_or_else(|| self.created_at.elapsed()),
        }
    }
}

#[derive(Default)]
struct LeaseState {
    pool: TokenPool,
    jobs: HashMap<JobId, JobEntry>,
}

impl LeaseState {
    fn publish_gauges(&self) {
        standard::ACTIVE_JOBS.set(self.jobs.len() as i64);
        standard::POOL_SIZE.set(self.pool.len() as i64);
        let outstanding: usize = self.jobs.values().map(|e| e.ledger.outstanding()).sum();
        standard::OUTSTANDING_BATCHES.set(outstanding as i64);
    }
}

/// Coordinator-side lease service
pub struct LeaseServer {
    config: CoordinatorConfig,
    state: Mutex<LeaseState>,
}

impl LeaseServer {
    /// Create a server over an already-built pool
    pub fn new(config: CoordinatorConfig, pool: TokenPool) -> Self {
        let state = LeaseState {
            pool,
            jobs: HashMap::new(),
        };
        state.publish_gauges();
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Create a server by scanning `config.token_dir`
    pub async fn from_dir(config: CoordinatorConfig) -> Result<Self> {
        let pool = TokenPool::scan(&config.token_dir).await?;
        info!(dir = %config.token_dir.display(), count = pool.len(), "Loaded token pool");
        Ok(Self::new(config, pool))
    }

    /// Lease the next batch for `job`, creating its ledger on first use
    pub fn get(&self, job: &Job) -> Batch {
        let mut state = self.state.lock();
        let LeaseState { pool, jobs } = &mut *state;

        debug!(job_id = %job.id, "get request");
        let entry = jobs.entry(job.id.clone()).or_insert_with(|| {
            info!(job_id = %job.id, tokens = pool.len(), "New job");
            JobEntry {
                ledger: TokenLedger::new(pool.tokens().iter().cloned()),
                created_at: Instant::now(),
                completed_after: None,
            }
        });

        let batch = entry.ledger.issue(job.batch_size);
        if batch.is_exhausted() {
            info!(job_id = %job.id, key = %batch.key, "nothing pending");
        } else {
            info!(job_id = %job.id, key = %batch.key, count = batch.len(), "assigned");
        }

        standard::BATCHES_ISSUED.inc();
        standard::TOKENS_ISSUED.inc_by(batch.len() as u64);
        standard::OUTSTANDING_BATCHES.add(1);
        standard::ACTIVE_JOBS.set(jobs.len() as i64);

        batch
    }

    /// Confirm a batch. The returned ack echoes the job id and key.
    pub fn done(&self, ack: &Ack) -> Result<Ack> {
        let mut state = self.state.lock();

        let confirmed = match state.jobs.get_mut(&ack.id) {
            Some(entry) => entry.ledger.confirm(ack.id.as_str(), &ack.key).map(|tokens| {
                if entry.completed_after.is_none() && entry.ledger.is_drained() {
                    let duration = entry.created_at.elapsed();
                    entry.completed_after = Some(duration);
                    info!(job_id = %ack.id, ?duration, "job complete");
                }
                tokens
            }),
            None => Err(LeaseError::UnknownKey {
                job_id: ack.id.to_string(),
                key: ack.key.to_string(),
            }),
        };

        match confirmed {
            Ok(tokens) => {
                info!(job_id = %ack.id, key = %ack.key, count = tokens.len(), "done");
                standard::BATCHES_CONFIRMED.inc();
                standard::OUTSTANDING_BATCHES.add(-1);
                Ok(ack.clone())
            }
            Err(e) => {
                warn!(job_id = %ack.id, key = %ack.key, "key not found");
                standard::UNKNOWN_KEYS.inc();
                Err(e)
            }
        }
    }

    /// Drop all job ledgers. Returns the pool size.
    pub fn reset(&self) -> usize {
        let mut state = self.state.lock();
        info!(jobs = state.jobs.len(), "deleting history");
        state.jobs.clear();
        state.publish_gauges();
        state.pool.len()
    }

    /// Re-read the token directory and drop all job ledgers.
    /// Returns the new pool size.
    ///
    /// The directory is read before the lock is taken, so of two
    /// overlapping rescans the one finishing last wins, even if its
    /// listing is older.
    pub async fn rescan(&self) -> Result<usize> {
        let pool = TokenPool::scan(&self.config.token_dir).await?;

        let mut state = self.state.lock();
        state.pool = pool;
        state.jobs.clear();
        state.publish_gauges();
        info!(count = state.pool.len(), "scanning folder");
        Ok(state.pool.len())
    }

    /// Shuffle the pool; only jobs created afterwards see the new order.
    pub fn shuffle(&self) -> usize {
        let mut state = self.state.lock();
        state.pool.shuffle();
        info!(count = state.pool.len(), "shuffling tokens");
        state.pool.len()
    }

    /// The pool in issue order
    pub fn show(&self) -> Vec<String> {
        let state = self.state.lock();
        debug!(count = state.pool.len(), "listing tokens");
        state.pool.tokens().to_vec()
    }

    /// Snapshot of one job, if its ledger exists
    pub fn status(&self, id: &JobId) -> Option<JobSnapshot> {
        let state = self.state.lock();
        state.jobs.get(id).map(|entry| entry.snapshot(id))
    }

    /// Drop job ledgers created more than `job_retention` before `now`.
    /// Returns how many were dropped.
    pub fn reap(&self, now: Instant) -> usize {
        let mut state = self.state.lock();
        let retention = self.config.job_retention;
        let before = state.jobs.len();
        state
            .jobs
            .retain(|_, entry| now.saturating_duration_since(entry.created_at) < retention);
        let pruned = before - state.jobs.len();
        state.publish_gauges();
        pruned
    }

    /// Run the reaper every `reap_interval` until `shutdown` fires
    pub fn spawn_reaper(self: &Arc<Self>, shutdown: ShutdownSignal) -> JoinHandle<()> {
        let server = Arc::clone(self);
        let period = server.config.reap_interval;

        tokio::spawn(async move {
            info!(?period, "starting cleaner");
            let mut ticker = interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let pruned = server.reap(Instant::now());
                        info!(pruned, "cleanup");
                    }
                    _ = shutdown.wait() => {
                        debug!("cleaner stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[tonic::async_trait]
impl LeaseChannel for LeaseServer {
    async fn get(&self, job: &Job) -> Result<Batch> {
        Ok(LeaseServer::get(self, job))
    }

    async fn done(&self, ack: &Ack) -> Result<Ack> {
        LeaseServer::done(self, ack)
    }
}

#[tonic::async_trait]
impl Tokens for LeaseServer {
    async fn get(&self, request: Request<pb::Job>) -> std::result::Result<Response<pb::Batch>, Status> {
        let job: Job = request.into_inner().try_into()?;
        let batch = LeaseServer::get(self, &job);
        Ok(Response::new(batch.into()))
    }

    async fn done(&self, request: Request<pb::Ack>) -> std::result::Result<Response<pb::Ack>, Status> {
        let ack: Ack = request.into_inner().into();
        let ack = LeaseServer::done(self, &ack)?;
        Ok(Response::new((&ack).into()))
    }

    async fn reset(&self, _request: Request<pb::Empty>) -> std::result::Result<Response<pb::Count>, Status> {
        let n = LeaseServer::reset(self);
        Ok(Response::new(pb::Count { n: n as u64 }))
    }

    async fn rescan(&self, _request: Request<pb::Empty>) -> std::result::Result<Response<pb::Count>, Status> {
        let n = LeaseServer::rescan(self).await?;
        Ok(Response::new(pb::Count { n: n as u64 }))
    }

    async fn shuffle(&self, _request: Request<pb::Empty>) -> std::result::Result<Response<pb::Count>, Status> {
        let n = LeaseServer::shuffle(self);
        Ok(Response::new(pb::Count { n: n as u64 }))
    }

    async fn show(&self, _request: Request<pb::Empty>) -> std::result::Result<Response<pb::TokenList>, Status> {
        Ok(Response::new(pb::TokenList {
            tokens: LeaseServer::show(self),
        }))
    }

    async fn status(&self, request: Request<pb::JobRef>) -> std::result::Result<Response<pb::JobStatus>, Status> {
        let id = JobId::new(request.into_inner().id);
        match LeaseServer::status(self, &id) {
            Some(snapshot) => Ok(Response::new(snapshot.into())),
            None => Err(Status::not_found(format!("job {} not found", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    fn server(tokens: &[&str]) -> LeaseServer {
        let pool = TokenPool::new(tokens.iter().map(|t| t.to_string()).collect());
        LeaseServer::new(CoordinatorConfig::default(), pool)
    }

    fn job(id: &str, size: usize) -> Job {
        Job::new(JobId::new(id), NonZeroUsize::new(size).unwrap())
    }

    #[test]
    fn test_jobs_have_independent_ledgers() {
        let server = server(&["a", "b"]);
        let first = server.get(&job("one", 2));
        let second = server.get(&job("two", 2));
        assert_eq!(first.tokens, vec!["a", "b"]);
        assert_eq!(second.tokens, vec!["a", "b"]);
    }

    #[test]
    fn test_done_echoes_ack() {
        let server = server(&["a"]);
        let job = job("one", 1);
        let batch = server.get(&job);
        let ack = Ack::for_batch(&job, &batch);
        assert_eq!(server.done(&ack).unwrap(), ack);
    }

    #[test]
    fn test_done_for_unknown_job() {
        let server = server(&["a"]);
        let ack = Ack {
            id: JobId::new("ghost"),
            key: crate::types::BatchKey::new("k"),
        };
        assert!(matches!(
            server.done(&ack),
            Err(LeaseError::UnknownKey { .. })
        ));
    }

    #[test]
    fn test_completion_tracked() {
        let server = server(&["a"]);
        let job = job("one", 5);

        let batch = server.get(&job);
        server.done(&Ack::for_batch(&job, &batch)).unwrap();
        let sentinel = server.get(&job);
        assert!(sentinel.is_exhausted());

        let status = server.status(&job.id).unwrap();
        assert!(status.completed);
        assert_eq!(status.batches_issued, 2);
        assert_eq!(status.outstanding, 1);

        server.done(&Ack::for_batch(&job, &sentinel)).unwrap();
        assert_eq!(server.status(&job.id).unwrap().batches_confirmed, 2);
    }

    #[test]
    fn test_reset_drops_jobs() {
        let server = server(&["a", "b"]);
        let job = job("one", 1);
        server.get(&job);

        assert_eq!(server.reset(), 2);
        assert!(server.status(&job.id).is_none());
        assert_eq!(server.get(&job).tokens, vec!["a"]);
    }

    #[test]
    fn test_reap_respects_retention() {
        let config = CoordinatorConfig {
            job_retention: Duration::from_secs(60),
            ..Default::default()
        };
        let server = LeaseServer::new(config, TokenPool::new(vec!["a".into()]));
        server.get(&job("one", 1));

        assert_eq!(server.reap(Instant::now()), 0);
        assert_eq!(server.reap(Instant::now() + Duration::from_secs(61)), 1);
        assert!(server.status(&JobId::new("one")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_task_drops_expired_jobs() {
        let config = CoordinatorConfig {
            job_retention: Duration::from_secs(60),
            reap_interval: Duration::from_secs(10),
            ..Default::default()
        };
        let server = Arc::new(LeaseServer::new(config, TokenPool::new(vec!["a".into()])));
        let job = job("one", 1);
        LeaseServer::get(&server, &job);

        let shutdown = ShutdownSignal::new();
        let reaper = server.spawn_reaper(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(server.status(&job.id).is_some());

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert!(server.status(&job.id).is_none());

        shutdown.shutdown();
        reaper.await.unwrap();
    }

    #[tokio::test]
    async fn test_rescan_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();

        let config = CoordinatorConfig {
            token_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let server = LeaseServer::from_dir(config).await.unwrap();
        assert_eq!(server.show(), vec!["a.jpg"]);

        std::fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        assert_eq!(server.rescan().await.unwrap(), 2);
        assert_eq!(server.show(), vec!["a.jpg", "b.jpg"]);
    }
}
