//! Worker state machine
//!
//! Repeats Get → process → Done until the coordinator hands back an empty
//! batch. Done is sent for every batch, the empty one included.

use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};

use super::channel::LeaseChannel;
use super::processor::{TokenProcessor, TokenRecord};
use crate::error::{LeaseError, Result};
use crate::metrics::standard;
use crate::types::{Ack, Job, JobId};

/// Worker phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Leasing and processing batches
    Running,
    /// Loop finished
    Done,
}

/// Why the loop reached [`WorkerPhase::Done`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Coordinator returned an empty batch
    Exhausted,
    /// `max_batches` non-empty batches were confirmed
    Capped,
}

/// Loop limits
#[derive(Debug, Clone, Default)]
pub struct LoopConfig {
    /// Stop after this many non-empty batches
    pub max_batches: Option<usize>,
}

/// What a finished loop did
#[derive(Debug, Clone)]
pub struct WorkerSummary {
    pub job_id: JobId,
    /// Non-empty batches confirmed
    pub batches: usize,
    pub tokens_processed: usize,
    pub tokens_failed: usize,
    /// Records for tokens of confirmed batches that processed cleanly
    pub records: Vec<TokenRecord>,
    pub stop_reason: Option<StopReason>,
}

impl WorkerSummary {
    fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            batches: 0,
            tokens_processed: 0,
            tokens_failed: 0,
            records: Vec::new(),
            stop_reason: None,
        }
    }
}

/// Client-side driver of the lease protocol
pub struct WorkerLoop<C, P> {
    channel: C,
    processor: P,
    job: Job,
    config: LoopConfig,
    phase: WorkerPhase,
    summary: WorkerSummary,
}

impl<C: LeaseChannel, P: TokenProcessor> WorkerLoop<C, P> {
    pub fn new(channel: C, processor: P, job: Job, config: LoopConfig) -> Self {
        let summary = WorkerSummary::new(job.id.clone());
        Self {
            channel,
            processor,
            job,
            config,
            phase: WorkerPhase::Running,
            summary,
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    pub fn summary(&self) -> &WorkerSummary {
        &self.summary
    }

    fn finish(&mut self, reason: StopReason) {
        info!(job_id = %self.job.id, ?reason, batches = self.summary.batches, "worker done");
        self.phase = WorkerPhase::Done;
        self.summary.stop_reason = Some(reason);
    }

    /// One Get → process → Done cycle. A no-op once `Done`.
    ///
    /// Channel failures are returned as-is; the caller treats them as fatal.
    pub async fn step(&mut self) -> Result<WorkerPhase> {
        if self.phase == WorkerPhase::Done {
            return Ok(self.phase);
        }

        let batch = self.channel.get(&self.job).await?;
        info!(job_id = %self.job.id, key = %batch.key, count = batch.len(), "received job tokens");

        let started = Instant::now();
        let mut records = Vec::with_capacity(batch.len());
        for token in &batch.tokens {
            match self.processor.process(token).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!(job_id = %self.job.id, token = %token, error = %e, "processing failed");
                    self.summary.tokens_failed += 1;
                }
            }
        }
        if !batch.is_exhausted() {
            let elapsed = started.elapsed();
            standard::BATCH_PROCESS_DURATION.observe_duration(elapsed);
            info!(job_id = %self.job.id, key = %batch.key, ?elapsed, "looping over tokens finished");
        }

        let ack = self.channel.done(&Ack::for_batch(&self.job, &batch)).await?;
        if ack.id != self.job.id {
            warn!(expected = %self.job.id, got = %ack.id, "ack carries a different job id");
        }

        self.summary.tokens_processed += records.len();
        self.summary.records.extend(records);

        if batch.is_exhausted() {
            self.finish(StopReason::Exhausted);
        } else {
            self.summary.batches += 1;
            if self
                .config
                .max_batches
                .is_some_and(|max| self.summary.batches >= max)
            {
                self.finish(StopReason::Capped);
            }
        }

        Ok(self.phase)
    }

    /// Drive the loop to `Done`
    pub async fn run(mut self) -> Result<WorkerSummary> {
        while self.phase == WorkerPhase::Running {
            self.step().await?;
        }
        Ok(self.summary)
    }
}

/// Write one JSON line per record to `<out_dir>/<job>/<job>_<hex nanos>.json`.
/// Returns `None` without touching the filesystem when there are no records.
pub async fn write_report(out_dir: &Path, summary: &WorkerSummary) -> Result<Option<PathBuf>> {
    if summary.records.is_empty() {
        return Ok(None);
    }

    let mut body = String::new();
    for record in &summary.records {
        body.push_str(&serde_json::to_string(record)?);
        body.push('\n');
    }

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LeaseError::Internal {
            message: e.to_string(),
        })?
        .as_nanos();
    let job = summary.job_id.as_str();
    let dir = out_dir.join(job);
    let file = dir.join(format!("{}_{:x}.json", job, stamp));

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| LeaseError::io(&dir, e))?;
    tokio::fs::write(&file, body)
        .await
        .map_err(|e| LeaseError::io(&file, e))?;

    info!(path = %file.display(), "writing output");
    Ok(Some(file))
}
