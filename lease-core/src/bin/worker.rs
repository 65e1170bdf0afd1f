//! Worker service binary

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use lease_core::protocol::batch_size_from_wire;
use lease_core::types::{Job, JobId};
use lease_core::worker::{
    write_report, ClientConfig, CoordinatorClient, CopyProcessor, DelayProcessor, LoopConfig,
    WorkerLoop,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Copy each token file from the source to the destination folder
    Copy,
    /// Sleep per token to simulate compute
    Delay,
}

/// Token lease worker
#[derive(Parser, Debug)]
#[command(name = "worker", version)]
struct Args {
    /// Coordinator address
    #[arg(long, env = "COORDINATOR_ADDR", default_value_t = ClientConfig::default().coordinator_addr)]
    host: String,

    /// Job id shared by cooperating workers; random if unset
    #[arg(long, env = "JOB_ID")]
    job_id: Option<String>,

    /// Tokens per batch, 1 to 2147483647
    #[arg(long, default_value = "100", value_parser = parse_batch_size)]
    batch_size: NonZeroUsize,

    /// Stop after this many batches
    #[arg(long)]
    max_batches: Option<usize>,

    #[arg(long, value_enum, default_value_t = Mode::Delay)]
    mode: Mode,

    /// Source folder (copy mode)
    #[arg(long, default_value = "/tf/images")]
    source_dir: PathBuf,

    /// Destination folder (copy mode)
    #[arg(long, default_value = "/tmp/data")]
    destination_dir: PathBuf,

    /// Simulated compute per token in ms (delay mode)
    #[arg(long, default_value_t = 100)]
    compute_delay_ms: u64,

    /// Folder for the per-job report
    #[arg(long, default_value = "/tmp")]
    out_dir: PathBuf,
}

fn parse_batch_size(raw: &str) -> Result<NonZeroUsize, String> {
    let value: i32 = raw
        .parse()
        .map_err(|e| format!("expected a positive 32-bit integer: {}", e))?;
    batch_size_from_wire(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let started = Instant::now();
    let args = Args::parse();

    let job_id = args.job_id.map(JobId::new).unwrap_or_else(JobId::generate);
    info!("job id: {}", job_id);
    let job = Job::new(job_id, args.batch_size);

    let client = CoordinatorClient::connect(ClientConfig {
        coordinator_addr: args.host,
        ..Default::default()
    })
    .await?;
    info!("connected to grpc server: {}", client.endpoint());

    let config = LoopConfig {
        max_batches: args.max_batches,
    };

    let summary = match args.mode {
        Mode::Copy => {
            let processor = CopyProcessor::new(args.source_dir, args.destination_dir).await?;
            WorkerLoop::new(client, processor, job, config).run().await?
        }
        Mode::Delay => {
            let processor = DelayProcessor::new(Duration::from_millis(args.compute_delay_ms));
            WorkerLoop::new(client, processor, job, config).run().await?
        }
    };

    info!(
        batches = summary.batches,
        processed = summary.tokens_processed,
        failed = summary.tokens_failed,
        "worker finished"
    );
    write_report(&args.out_dir, &summary).await?;

    info!("all done: {:?}", started.elapsed());
    Ok(())
}
