//! Error types for token leasing
//!
//! Covers protocol violations, partitioning failures, transport and
//! local I/O errors.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for all lease operations
#[derive(Debug, Error)]
pub enum LeaseError {
    // ========== Protocol Errors ==========

    /// Malformed request, rejected at the server boundary
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Done referenced a key that is not currently outstanding
    #[error("Unknown batch key {key} for job {job_id}")]
    UnknownKey { job_id: String, key: String },

    // ========== Partitioning Errors ==========

    /// Worker index falls beyond the chunks the item list splits into
    #[error(
        "Worker {worker_index} out of range: {total_items} items over {replica_count} replicas yield {chunk_count} chunks"
    )]
    ShardOutOfRange {
        worker_index: usize,
        chunk_count: usize,
        total_items: usize,
        replica_count: usize,
    },

    /// Cluster config present but unusable
    #[error("Invalid cluster config: {reason}")]
    ClusterConfig { reason: String },

    // ========== Transport Errors ==========

    /// Could not reach the coordinator
    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// Request reached the coordinator but failed there
    #[error("RPC failed ({code}): {message}")]
    Rpc { code: tonic::Code, message: String },

    // ========== Local Errors ==========

    /// Filesystem operation failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Glob pattern could not be used
    #[error("Bad file pattern {pattern}: {reason}")]
    Pattern { pattern: String, reason: String },

    /// JSON encoding or decoding failed
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LeaseError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LeaseError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the caller broke the Get/Done protocol
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            LeaseError::InvalidRequest { .. } | LeaseError::UnknownKey { .. }
        )
    }

    /// Returns true if the failure belongs to the RPC channel
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LeaseError::ConnectionFailed { .. } | LeaseError::Rpc { .. }
        )
    }
}

impl From<LeaseError> for tonic::Status {
    fn from(err: LeaseError) -> Self {
        match &err {
            LeaseError::InvalidRequest { .. } => tonic::Status::invalid_argument(err.to_string()),
            LeaseError::UnknownKey { .. } => tonic::Status::not_found(err.to_string()),
            _ => tonic::Status::internal(err.to_string()),
        }
    }
}

/// Result type alias for lease operations
pub type Result<T> = std::result::Result<T, LeaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let status: tonic::Status = LeaseError::InvalidRequest {
            reason: "batch size must be positive".into(),
        }
        .into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = LeaseError::UnknownKey {
            job_id: "job".into(),
            key: "k".into(),
        }
        .into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = LeaseError::Internal {
            message: "boom".into(),
        }
        .into();
        assert_eq!(status.code(), tonic::Code::Internal);
    }

    #[test]
    fn test_classification() {
        let err = LeaseError::UnknownKey {
            job_id: "job".into(),
            key: "k".into(),
        };
        assert!(err.is_protocol_violation());
        assert!(!err.is_transport());

        let err = LeaseError::ConnectionFailed {
            endpoint: "http://localhost:7001".into(),
            reason: "refused".into(),
        };
        assert!(err.is_transport());
    }
}
