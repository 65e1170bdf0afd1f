//! Out-of-band file splitting
//!
//! Lists the input files in a stable order, computes this worker's shard
//! and copies that shard into the output directory. Used when no
//! coordinator is available.

use std::path::{Path, PathBuf};

use tracing::info;

use super::identity::WorkerIdentity;
use super::shard::{compute_shard, Shard};
use crate::error::{LeaseError, Result};

/// Inputs for one split run
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Source directory
    pub input_path: PathBuf,
    /// Destination directory, created if absent
    pub output_path: PathBuf,
    /// Glob matched against file names in `input_path`
    pub file_pattern: String,
}

/// Outcome of a split run
#[derive(Debug, Clone)]
pub struct SplitReport {
    pub shard: Shard,
    pub files_found: usize,
    /// `(source, destination)` for every copied file
    pub copied: Vec<(PathBuf, PathBuf)>,
}

/// Regular files in `input` matching `pattern`, in lexicographic path order
pub fn list_files(input: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = if pattern.is_empty() { "*" } else { pattern };
    let full = input.join(pattern);
    let full = full.to_string_lossy();

    let entries = glob::glob(&full).map_err(|e| LeaseError::Pattern {
        pattern: full.to_string(),
        reason: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            LeaseError::io(path, e.into_error())
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Copy `files` into `output`, keeping each file name
pub async fn copy_files(files: &[PathBuf], output: &Path, worker_index: usize) -> Result<Vec<(PathBuf, PathBuf)>> {
    tokio::fs::create_dir_all(output)
        .await
        .map_err(|e| LeaseError::io(output, e))?;

    let mut copied = Vec::with_capacity(files.len());
    for source in files {
        let name = source.file_name().ok_or_else(|| LeaseError::Internal {
            message: format!("{} has no file name", source.display()),
        })?;
        let destination = output.join(name);

        info!(
            worker = worker_index,
            "{} -> {}",
            source.display(),
            destination.display()
        );
        tokio::fs::copy(source, &destination)
            .await
            .map_err(|e| LeaseError::io(source, e))?;

        copied.push((source.clone(), destination));
    }
    Ok(copied)
}

/// Run a full split for `identity`.
///
/// Fails before copying anything if the identity has no shard.
pub async fn split(config: &SplitConfig, identity: WorkerIdentity) -> Result<SplitReport> {
    let files = list_files(&config.input_path, &config.file_pattern)?;
    info!("found {} files matching provided pattern", files.len());

    let shard = compute_shard(files.len(), identity.replica_count, identity.index)?;
    info!(
        worker = identity.index,
        replicas = identity.replica_count,
        start = shard.start,
        end = shard.end,
        "Copying shard"
    );

    let copied = copy_files(shard.slice(&files), &config.output_path, identity.index).await?;

    Ok(SplitReport {
        shard,
        files_found: files.len(),
        copied,
    })
}
