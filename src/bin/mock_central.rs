//! Mock central backend
//!
//! Stands in for the central server during local runs of the hub.
//!
//! Behavior:
//! 1. Listens on a configurable port (default 8080)
//! 2. Accepts POSTs to /HeartBeat, /DeviceStatus and /ParkInOut (any path, really)
//! 3. Logs each JSON body with snapshot content shortened
//! 4. Answers 200 `{"code":"0","msg":"success"}`, or 500 with `--fail`
//!
//! Usage:
//!   cargo run --bin mock_central -- --port 8080
//!   cargo run --bin mock_central -- --port 8080 --fail

use clap::Parser;
use hyper::StatusCode;
use lot_hub::io::MockCentral;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock_central")]
#[command(about = "Mock central backend for local runs of the lot hub")]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Answer every request with 500 to exercise failure paths
    #[arg(long)]
    fail: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_timer(UtcTime::rfc_3339()).with_target(false).init();

    let args = Args::parse();

    let central = Arc::new(MockCentral::new());
    if args.fail {
        central.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
    info!(port = args.port, fail = args.fail, "mock_central_starting");

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        let _ = shutdown_tx.send(true);
    });

    central.clone().serve(listener, shutdown_rx).await;
    info!(requests = central.requests().len(), "mock_central_stopped");
    Ok(())
}
