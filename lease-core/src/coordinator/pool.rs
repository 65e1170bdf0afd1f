//! Token pool
//!
//! The ordered list of work tokens every new job ledger starts from.

use std::path::Path;

use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::{LeaseError, Result};

/// Ordered set of tokens the coordinator hands out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPool {
    tokens: Vec<String>,
}

impl TokenPool {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    /// Build a pool from the regular files directly under `dir`, by name
    pub async fn scan(dir: &Path) -> Result<Self> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| LeaseError::io(dir, e))?;

        let mut tokens = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LeaseError::io(dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| LeaseError::io(entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            tokens.push(entry.file_name().to_string_lossy().into_owned());
        }
        tokens.sort();

        debug!(dir = %dir.display(), count = tokens.len(), "Scanned token directory");
        Ok(Self { tokens })
    }

    /// Randomly permute the pool
    pub fn shuffle(&mut self) {
        self.tokens.shuffle(&mut rand::thread_rng());
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let pool = TokenPool::scan(dir.path()).await.unwrap();
        assert_eq!(pool.tokens(), ["a.jpg", "b.jpg"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scan_skips_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        std::os::unix::fs::symlink(dir.path().join("a.jpg"), dir.path().join("link.jpg")).unwrap();

        let pool = TokenPool::scan(dir.path()).await.unwrap();
        assert_eq!(pool.tokens(), ["a.jpg"]);
    }

    #[tokio::test]
    async fn test_scan_missing_dir() {
        let result = TokenPool::scan(Path::new("/definitely/not/here")).await;
        assert!(matches!(result, Err(LeaseError::Io { .. })));
    }

    #[test]
    fn test_shuffle_keeps_tokens() {
        let mut pool = TokenPool::new((0..100).map(|i| format!("t{}", i)).collect());
        pool.shuffle();

        let mut sorted = pool.tokens().to_vec();
        sorted.sort();
        let mut expected: Vec<String> = (0..100).map(|i| format!("t{}", i)).collect();
        expected.sort();
        assert_eq!(sorted, expected);
    }
}
