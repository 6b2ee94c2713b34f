//! Host utilities - wall clock formatting, local IP, snapshot encoding

use base64::{engine::general_purpose::STANDARD, Engine};
use std::net::UdpSocket;
use std::sync::OnceLock;
use time::macros::format_description;
use time::error::IndeterminateOffset;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, error};

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Capture the local UTC offset.
///
/// Must run before any other thread is spawned: the offset cannot be read
/// safely from a multi-threaded process, so later lookups use this value.
/// Falls back to UTC when the offset is unknown; the error is returned so it
/// can be logged once logging is up.
pub fn init_local_offset() -> Result<UtcOffset, IndeterminateOffset> {
    let result = UtcOffset::current_local_offset();
    let _ = LOCAL_OFFSET.set(result.unwrap_or(UtcOffset::UTC));
    result
}

/// Format used for every timestamp sent to central ("2024-04-11 21:32:51")
pub fn format_timestamp(dt: OffsetDateTime) -> String {
    dt.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_default()
}

/// Current local time as `YYYY-MM-DD HH:MM:SS` (UTC if the offset is unknown)
pub fn now_timestamp() -> String {
    let offset = LOCAL_OFFSET.get().copied().unwrap_or(UtcOffset::UTC);
    format_timestamp(OffsetDateTime::now_utc().to_offset(offset))
}

/// Find the local IPv4 address used to reach `host:port`.
///
/// Connecting a UDP socket sends nothing; it only asks the kernel for a route.
pub fn local_ip_towards(host: &str, port: u16) -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect((host, port)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() {
        return None;
    }
    debug!(ip = %ip, "local_ip_discovered");
    Some(ip.to_string())
}

/// Read a snapshot from disk and return it base64 encoded.
///
/// An empty path yields an empty string. Read failures are logged and also
/// yield an empty string so the event can still be reported.
pub async fn encode_image_file(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    match tokio::fs::read(path).await {
        Ok(bytes) => STANDARD.encode(bytes),
        Err(e) => {
            error!(path = %path, error = %e, "image_read_failed");
            String::new()
        }
    }
}
