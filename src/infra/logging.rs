//! Tracing subscriber setup
//!
//! Level is configurable via RUST_LOG (default: info). When a log directory
//! is configured, a daily rolling `lot-hub.log` is written alongside stdout.

use anyhow::Context;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init(log_dir: Option<&str>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_timer(UtcTime::rfc_3339()).with_target(false);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry().with(filter).with(stdout_layer).init();
        return Ok(None);
    };

    let dir = Path::new(dir);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(dir, "lot-hub.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry().with(filter).with(stdout_layer).with(file_layer).init();

    Ok(Some(guard))
}
