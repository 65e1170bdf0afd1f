//! Per-token processing
//!
//! The work a worker performs on each leased token. The loop treats it as
//! opaque: failures are reported but never roll back a lease.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{LeaseError, Result};

/// Outcome of processing one token, written to the worker report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub filename: String,
    pub file_size: u64,
    pub file_read_time: Duration,
    pub file_write_time: Duration,
}

#[tonic::async_trait]
pub trait TokenProcessor: Send + Sync {
    async fn process(&self, token: &str) -> Result<TokenRecord>;
}

/// Copies `source_dir/token` to `destination_dir/token`
#[derive(Debug, Clone)]
pub struct CopyProcessor {
    source_dir: PathBuf,
    destination_dir: PathBuf,
}

impl CopyProcessor {
    /// Create the processor, making sure the destination exists
    pub async fn new(source_dir: impl Into<PathBuf>, destination_dir: impl Into<PathBuf>) -> Result<Self> {
        let destination_dir = destination_dir.into();
        tokio::fs::create_dir_all(&destination_dir)
            .await
            .map_err(|e| LeaseError::io(&destination_dir, e))?;
        Ok(Self {
            source_dir: source_dir.into(),
            destination_dir,
        })
    }
}

#[tonic::async_trait]
impl TokenProcessor for CopyProcessor {
    async fn process(&self, token: &str) -> Result<TokenRecord> {
        let source = self.source_dir.join(token);
        let destination = self.destination_dir.join(token);

        let started = Instant::now();
        let data = tokio::fs::read(&source)
            .await
            .map_err(|e| LeaseError::io(&source, e))?;
        let file_read_time = started.elapsed();

        let started = Instant::now();
        tokio::fs::write(&destination, &data)
            .await
            .map_err(|e| LeaseError::io(&destination, e))?;
        let file_write_time = started.elapsed();

        Ok(TokenRecord {
            filename: token.to_string(),
            file_size: data.len() as u64,
            file_read_time,
            file_write_time,
        })
    }
}

/// Simulates compute by sleeping a fixed time per token
#[derive(Debug, Clone)]
pub struct DelayProcessor {
    delay: Duration,
}

impl DelayProcessor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[tonic::async_trait]
impl TokenProcessor for DelayProcessor {
    async fn process(&self, token: &str) -> Result<TokenRecord> {
        tokio::time::sleep(self.delay).await;
        Ok(TokenRecord {
            filename: token.to_string(),
            file_size: 0,
            file_read_time: Duration::ZERO,
            file_write_time: Duration::ZERO,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_processor() {
        let source = tempfile::tempdir().unwrap();
        let destination = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("img.jpg"), b"pixels").unwrap();

        let processor = CopyProcessor::new(source.path(), destination.path().join("out"))
            .await
            .unwrap();
        let record = processor.process("img.jpg").await.unwrap();

        assert_eq!(record.filename, "img.jpg");
        assert_eq!(record.file_size, 6);
        assert_eq!(
            std::fs::read(destination.path().join("out/img.jpg")).unwrap(),
            b"pixels"
        );
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let source = tempfile::tempdir().unwrap();
        let destination = tempfile::tempdir().unwrap();
        let processor = CopyProcessor::new(source.path(), destination.path()).await.unwrap();

        assert!(matches!(
            processor.process("missing.jpg").await,
            Err(LeaseError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_delay_processor() {
        let processor = DelayProcessor::new(Duration::from_millis(1));
        let record = processor.process("t").await.unwrap();
        assert_eq!(record.file_size, 0);
    }
}
