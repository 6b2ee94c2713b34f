//! In-process stand-in for the central backend
//!
//! Records every request and answers the three central endpoints with a
//! configurable status. Unknown paths get 404. Backs the `mock_central` binary and the exchange tests.

use crate::domain::payload::Endpoint;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{CONTENT_TYPE, USER_AGENT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
}

pub struct MockCentral {
    status: AtomicU16,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl Default for MockCentral {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCentral {
    pub fn new() -> Self {
        Self { status: AtomicU16::new(StatusCode::OK.as_u16()), requests: Mutex::new(Vec::new()) }
    }

    /// Status returned to every following request
    pub fn set_status(&self, status: StatusCode) {
        self.status.store(status.as_u16(), Ordering::Relaxed);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests.lock().iter().filter(|r| r.path == path).cloned().collect()
    }

    /// Bind an ephemeral loopback port and serve until the runtime ends
    pub async fn spawn(self: Arc<Self>) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            self.serve(listener, rx).await;
            drop(tx);
        });
        Ok(addr)
    }

    pub async fn serve(self: Arc<Self>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "mock_central_started");
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _peer)) => {
                            let io = TokioIo::new(stream);
                            let central = self.clone();
                            tokio::spawn(async move {
                                let service = service_fn(move |req| {
                                    let central = central.clone();
                                    async move { central.handle(req).await }
                                });
                                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                    debug!(error = %e, "mock_central_connection_error");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "mock_central_accept_error"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("mock_central_shutdown");
                        return;
                    }
                }
            }
        }
    }

    /// Configured status for the known endpoints, 404 for anything else
    fn status_for(&self, path: &str) -> StatusCode {
        if Endpoint::from_path(path).is_none() {
            return StatusCode::NOT_FOUND;
        }
        StatusCode::from_u16(self.status.load(Ordering::Relaxed)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    async fn handle(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        let header = |name: hyper::header::HeaderName| req.headers().get(name).and_then(|v| v.to_str().ok()).map(String::from);
        let content_type = header(CONTENT_TYPE);
        let user_agent = header(USER_AGENT);
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let body = match req.into_body().collect().await {
            Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).into_owned(),
            Err(e) => {
                error!(error = %e, "mock_central_body_error");
                String::new()
            }
        };

        info!(method = %method, path = %path, body = %redact_images(&body), "mock_central_request");
        let status = self.status_for(&path);
        self.requests.lock().push(RecordedRequest { method, path, body, content_type, user_agent });

        let reply = if status == StatusCode::OK {
            r#"{"code":"0","msg":"success"}"#
        } else {
            r#"{"code":"-1","msg":"fail"}"#
        };

        let response = Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(reply.as_bytes())))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())));
        Ok(response)
    }
}

/// Replace base64 snapshots with their length so request logs stay readable
fn redact_images(body: &str) -> String {
    let Ok(mut value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    for key in ["lot_in_image", "lot_out_image"] {
        if let Some(field) = value.get_mut(key) {
            if let Some(len) = field.as_str().map(str::len).filter(|len| *len > 0) {
                *field = serde_json::Value::String(format!("<{len} bytes>"));
            }
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_images() {
        let body = r#"{"lot_in_image":"aGVsbG8=","lot_out_image":"","lpn":"ABC"}"#;
        let redacted: serde_json::Value = serde_json::from_str(&redact_images(body)).unwrap();
        assert_eq!(redacted["lot_in_image"], "<8 bytes>");
        assert_eq!(redacted["lot_out_image"], "");
        assert_eq!(redacted["lpn"], "ABC");
        assert_eq!(redact_images("not json"), "not json");
    }

    #[test]
    fn test_status_for_known_and_unknown_paths() {
        let central = MockCentral::new();
        assert_eq!(central.status_for("/HeartBeat"), StatusCode::OK);
        assert_eq!(central.status_for("/nope"), StatusCode::NOT_FOUND);

        central.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(central.status_for("/ParkInOut"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(central.status_for("/"), StatusCode::NOT_FOUND);
    }
}
