//! Worker identity discovery
//!
//! Resolves `(index, replica_count)` from command-line flags, the
//! cluster-config environment variable and the hostname suffix.

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{LeaseError, Result};

/// Environment variable carrying the cluster config JSON
pub const CLUSTER_CONFIG_VAR: &str = "TF_CONFIG";

/// Environment variable carrying the pod hostname
pub const HOSTNAME_VAR: &str = "HOSTNAME";

/// This worker's position among its replicas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerIdentity {
    pub index: usize,
    pub replica_count: usize,
}

impl Default for WorkerIdentity {
    fn default() -> Self {
        Self {
            index: 0,
            replica_count: 1,
        }
    }
}

/// Environment inputs for identity resolution
#[derive(Debug, Clone, Default)]
pub struct WorkerEnv {
    pub cluster_config: Option<String>,
    pub hostname: Option<String>,
}

impl WorkerEnv {
    /// Read the relevant variables from the process environment
    pub fn from_process() -> Self {
        Self {
            cluster_config: std::env::var(CLUSTER_CONFIG_VAR).ok(),
            hostname: std::env::var(HOSTNAME_VAR).ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClusterConfig {
    cluster: ClusterSpec,
    task: TaskSpec,
}

#[derive(Debug, Deserialize)]
struct ClusterSpec {
    #[serde(default)]
    worker: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TaskSpec {
    index: usize,
}

/// Trailing numeric suffix of a hostname such as `split-worker-3`
fn hostname_index(hostname: &str) -> Option<usize> {
    let suffix = hostname
        .rsplit_once('-')
        .map(|(_, suffix)| suffix)
        .unwrap_or(hostname);
    suffix.parse().ok()
}

/// Resolve this worker's identity.
///
/// Precedence: a non-empty cluster config supplies both values; otherwise a
/// hostname with a numeric suffix supplies the index; otherwise the flags
/// are used as given.
pub fn resolve_worker_identity(env: &WorkerEnv, flags: WorkerIdentity) -> Result<WorkerIdentity> {
    let mut identity = flags;

    match env.hostname.as_deref().filter(|h| !h.is_empty()) {
        Some(hostname) => match hostname_index(hostname) {
            Some(index) => {
                debug!(hostname, index, "Index taken from hostname");
                identity.index = index;
            }
            None => debug!(hostname, "Hostname carries no index suffix"),
        },
        None => debug!("Hostname not set"),
    }

    match env.cluster_config.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(raw) => {
            let config: ClusterConfig =
                serde_json::from_str(raw).map_err(|e| LeaseError::ClusterConfig {
                    reason: e.to_string(),
                })?;
            if config.cluster.worker.is_empty() {
                return Err(LeaseError::ClusterConfig {
                    reason: "cluster.worker list is empty".into(),
                });
            }
            identity = WorkerIdentity {
                index: config.task.index,
                replica_count: config.cluster.worker.len(),
            };
        }
        None => info!("{} is either empty or not defined", CLUSTER_CONFIG_VAR),
    }

    if identity.replica_count == 0 {
        return Err(LeaseError::InvalidRequest {
            reason: "replica count must be at least 1".into(),
        });
    }

    info!(
        index = identity.index,
        replica_count = identity.replica_count,
        "Resolved worker identity"
    );
    Ok(identity)
}
