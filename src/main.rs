//! Lot hub - parking / EV-charging edge hub
//!
//! Accepts camera notifications over HTTP and pushes heartbeats, device
//! status and park-in/out events to the central backend.
//!
//! Module structure:
//! - `domain/` - Events, status codes, central payloads
//! - `io/` - Camera listener, central client session
//! - `services/` - Timers, orchestrator, central dispatcher
//! - `infra/` - Config, logging, storage, reachability

use anyhow::Context;
use clap::Parser;
use lot_hub::infra::{host, logging, CentralReachability, Config, LotStore, MemoryStore};
use lot_hub::io::CameraListener;
use lot_hub::services::{CentralDispatcher, TimerOrchestrator};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Lot hub - camera endpoint and central telemetry
#[derive(Parser, Debug)]
#[command(name = "lot-hub", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // A bad config is fatal; nothing is started
    let config = Config::from_file(&args.config)?;

    // Before logging: the file writer spawns a thread
    let offset = host::init_local_offset();
    let _log_guard = logging::init(config.log_dir())?;
    if let Err(e) = offset {
        warn!(error = %e, "local_offset_unavailable");
    }

    let exe = std::env::args().next().unwrap_or_else(|| "lot-hub".to_string());
    info!(
        exe = %exe,
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        "lot_hub_starting"
    );
    info!(
        config_file = %config.config_file(),
        carpark_code = %config.carpark_code(),
        camera = %format!("{}:{}", config.camera_bind_ip(), config.camera_port()),
        central = %format!("{}:{}", config.central_host(), config.central_port()),
        filter_secs = config.filter_snapshot_interval().as_secs(),
        device_status_secs = config.device_status_interval().as_secs(),
        heartbeat_secs = config.heartbeat_interval().as_secs(),
        worker_threads = config.worker_threads(),
        "config_loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reachability = CentralReachability::new();
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(CentralDispatcher::new(&config, reachability.clone()));

    let device_ip = match config.device_ip() {
        Some(ip) => ip.to_string(),
        None => host::local_ip_towards(config.central_host(), config.central_port())
            .unwrap_or_else(|| {
                warn!("device_ip_unknown");
                "0.0.0.0".to_string()
            }),
    };
    info!(device_ip = %device_ip, "device_ip_selected");

    let orchestrator = TimerOrchestrator::new(&config, &device_ip, dispatcher, store.clone());
    orchestrator.start();

    // Bind failure leaves the hub without a camera endpoint; timers keep running
    let listener_task = match CameraListener::bind(config.camera_bind_ip(), config.camera_port()).await {
        Ok(listener) => Some(tokio::spawn(listener.run(shutdown_rx))),
        Err(e) => {
            error!(
                ip = %config.camera_bind_ip(),
                port = config.camera_port(),
                error = %e,
                "camera_listener_bind_failed"
            );
            None
        }
    };

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown_signal_received");
    let _ = shutdown_tx.send(true);
    orchestrator.stop();

    if let Some(task) = listener_task {
        if let Err(e) = task.await {
            error!(error = %e, "camera_listener_join_failed");
        }
    }

    info!(
        central_reachable = reachability.is_reachable(),
        pending_status = store.status_count(),
        pending_transactions = store.transaction_count(),
        "lot_hub_shutdown_complete"
    );
    Ok(())
}
