//! Coordinator admin tool

use std::time::Instant;

use clap::{Parser, ValueEnum};
use lease_core::types::JobId;
use lease_core::worker::{ClientConfig, CoordinatorClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Action {
    /// Drop all job history
    Reset,
    /// Re-read the coordinator's folder
    Rescan,
    /// Shuffle the token pool
    Shuffle,
    /// Print the token pool
    Show,
    /// Print one job's progress
    Status,
}

/// Admin actions against a running coordinator
#[derive(Parser, Debug)]
#[command(name = "lease-admin", version)]
struct Args {
    /// Coordinator address
    #[arg(long, env = "COORDINATOR_ADDR", default_value_t = ClientConfig::default().coordinator_addr)]
    host: String,

    #[arg(long, value_enum, default_value_t = Action::Reset)]
    action: Action,

    /// Job to report on (status only)
    #[arg(long, required_if_eq("action", "status"))]
    job_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let started = Instant::now();
    let args = Args::parse();

    let client = CoordinatorClient::connect(ClientConfig {
        coordinator_addr: args.host,
        ..Default::default()
    })
    .await?;

    match args.action {
        Action::Reset => info!("reset request completed: {}", client.reset().await?),
        Action::Rescan => info!("rescan request completed: {}", client.rescan().await?),
        Action::Shuffle => info!("shuffle request completed: {}", client.shuffle().await?),
        Action::Show => {
            for token in client.show().await? {
                println!("{}", token);
            }
        }
        Action::Status => {
            let id = JobId::new(args.job_id.unwrap_or_default());
            match client.status(&id).await? {
                Some(job) => println!(
                    "job {}: remaining={} outstanding={} issued={} confirmed={} completed={} elapsed={:?}",
                    job.id,
                    job.remaining,
                    job.outstanding,
                    job.batches_issued,
                    job.batches_confirmed,
                    job.completed,
                    job.elapsed
                ),
                None => println!("job {} not found", id),
            }
        }
    }

    info!("all done: {:?}", started.elapsed());
    Ok(())
}
