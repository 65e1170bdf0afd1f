//! Token ledger
//!
//! Coordinator-side record of which tokens are still unissued and which
//! batches are leased but not yet confirmed. Every token lives in exactly
//! one place: `remaining`, one outstanding batch, or retired after confirm.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;

use tracing::debug;

use crate::error::{LeaseError, Result};
use crate::types::{Batch, BatchKey};

/// Ledger for one job.
///
/// Not synchronized itself; the owner serializes `issue` and `confirm`.
#[derive(Debug, Default)]
pub struct TokenLedger {
    /// Unissued tokens in original order
    remaining: VecDeque<String>,
    /// Leased tokens by batch key
    outstanding: HashMap<BatchKey, Vec<String>>,
    /// Batches issued so far, including empty ones
    issued: u64,
    /// Batches confirmed so far
    confirmed: u64,
}

impl TokenLedger {
    /// Create a ledger over `tokens`, preserving their order
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            remaining: tokens.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Lease up to `batch_size` tokens from the front of the queue.
    ///
    /// Always returns a fresh key. An empty token list means the pool is
    /// exhausted; that batch still has to be confirmed.
    pub fn issue(&mut self, batch_size: NonZeroUsize) -> Batch {
        let count = batch_size.get().min(self.remaining.len());
        let tokens: Vec<String> = self.remaining.drain(..count).collect();

        let key = BatchKey::generate(self.issued);
        self.issued += 1;
        self.outstanding.insert(key.clone(), tokens.clone());

        debug!(key = %key, count = tokens.len(), remaining = self.remaining.len(), "Issued batch");

        Batch { key, tokens }
    }

    /// Retire the batch leased under `key` and return its tokens.
    ///
    /// Fails with [`LeaseError::UnknownKey`] for keys never issued or
    /// already confirmed; the ledger is left untouched in that case.
    pub fn confirm(&mut self, job_id: &str, key: &BatchKey) -> Result<Vec<String>> {
        let tokens = self
            .outstanding
            .remove(key)
            .ok_or_else(|| LeaseError::UnknownKey {
                job_id: job_id.to_string(),
                key: key.to_string(),
            })?;
        self.confirmed += 1;

        debug!(key = %key, count = tokens.len(), outstanding = self.outstanding.len(), "Confirmed batch");

        Ok(tokens)
    }

    /// Tokens not yet issued
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Batches issued but not confirmed
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Tokens currently leased across all outstanding batches
    pub fn outstanding_tokens(&self) -> usize {
        self.outstanding.values().map(Vec::len).sum()
    }

    pub fn batches_issued(&self) -> u64 {
        self.issued
    }

    pub fn batches_confirmed(&self) -> u64 {
        self.confirmed
    }

    /// Nothing left to issue and nothing leased
    pub fn is_drained(&self) -> bool {
        self.remaining.is_empty() && self.outstanding.is_empty()
    }
}
