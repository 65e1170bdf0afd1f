//! Coordinator service binary

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use clap::Parser;
use lease_core::coordinator::{CoordinatorConfig, LeaseServer};
use lease_core::protocol::tokens_server::TokensServer;
use lease_core::runtime::ShutdownSignal;
use lease_core::{DEFAULT_METRICS_PORT, DEFAULT_PORT};
use tonic::transport::Server;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Token lease coordinator
#[derive(Parser, Debug)]
#[command(name = "coordinator", version)]
struct Args {
    /// Folder to scan for files
    #[arg(long, env = "LEASE_DIR", default_value = "/tf/images")]
    dir: PathBuf,

    /// gRPC listen address
    #[arg(long, env = "BIND_ADDR", default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
    host: SocketAddr,

    /// Metrics listen address
    #[arg(long, env = "METRICS_ADDR", default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_METRICS_PORT)))]
    metrics_addr: SocketAddr,

    /// Drop job ledgers older than this
    #[arg(long, env = "JOB_RETENTION_SECS", default_value_t = 24 * 60 * 60)]
    job_retention_secs: u64,

    /// How often to look for expired job ledgers
    #[arg(long, env = "REAP_INTERVAL_SECS", default_value_t = 60 * 60)]
    reap_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("Starting lease coordinator");

    let config = CoordinatorConfig {
        token_dir: args.dir,
        job_retention: Duration::from_secs(args.job_retention_secs),
        reap_interval: Duration::from_secs(args.reap_interval_secs.max(1)),
    };

    let server = Arc::new(LeaseServer::from_dir(config).await?);

    let shutdown = ShutdownSignal::new();
    shutdown.trigger_on_ctrl_c();
    let reaper = server.spawn_reaper(shutdown.clone());

    // Metrics API
    let metrics_addr = args.metrics_addr;
    let metrics_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let app = Router::new()
            .route("/metrics", get(|| async { lease_core::metrics::gather_system_metrics() }))
            .layer(CorsLayer::permissive());

        let listener = match tokio::net::TcpListener::bind(metrics_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!("Metrics server could not bind {}: {}", metrics_addr, e);
                return;
            }
        };
        info!("Metrics API listening on {}", metrics_addr);

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { metrics_shutdown.wait().await })
            .await
        {
            warn!("Metrics server error: {}", e);
        }
    });

    info!("listening on {}", args.host);
    info!("ctrl-c to exit");

    let grpc_shutdown = shutdown.clone();
    Server::builder()
        .add_service(TokensServer::from_arc(server))
        .serve_with_shutdown(args.host, async move { grpc_shutdown.wait().await })
        .await?;

    shutdown.shutdown();
    reaper.await?;
    info!("Coordinator stopped");
    Ok(())
}
