//! Static file splitter
//!
//! Copies this worker's contiguous share of the matching input files into
//! the output folder. Exits non-zero if the worker has no share.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lease_core::partition::{resolve_worker_identity, split, SplitConfig, WorkerEnv, WorkerIdentity};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Split a file list across replicas
#[derive(Parser, Debug)]
#[command(name = "split", version)]
struct Args {
    /// Input path for reading files
    #[arg(long = "input_path")]
    input_path: PathBuf,

    /// Output path for copying files
    #[arg(long = "output_path")]
    output_path: PathBuf,

    /// Pattern to search files with
    #[arg(long = "file_pattern", default_value = "*")]
    file_pattern: String,

    /// Replica count for the stateful set
    #[arg(long = "replica_count", default_value_t = 1)]
    replica_count: usize,

    /// Index of this worker (starts at 0)
    #[arg(long = "index", default_value_t = 0)]
    index: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let flags = WorkerIdentity {
        index: args.index,
        replica_count: args.replica_count,
    };

    let identity = match resolve_worker_identity(&WorkerEnv::from_process(), flags) {
        Ok(identity) => identity,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = SplitConfig {
        input_path: args.input_path,
        output_path: args.output_path,
        file_pattern: args.file_pattern,
    };

    match split(&config, identity).await {
        Ok(report) => {
            info!(
                worker = identity.index,
                copied = report.copied.len(),
                of = report.files_found,
                "split complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("could not split file list into worker count {}: {}", identity.replica_count, e);
            ExitCode::FAILURE
        }
    }
}
