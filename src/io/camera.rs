//! Camera-facing HTTP endpoint
//!
//! The camera (or trigger device) POSTs notifications here. Every POST gets
//! `200 {"code":"0","msg":"success"}`, every other method gets
//! `400 {"code":"-1","msg":"fail"}`. The body is only logged.
//!
//! Each accepted connection is one session task: read → respond → read again
//! while the client keeps the connection alive. A session that stays silent
//! longer than the read timeout is dropped. A request whose body does not
//! arrive in full within the timeout ends the session without a response.
//!
//! Requests that fail to parse are answered by hyper itself with a bare
//! `400 Bad Request` and `Connection: close`, then the session ends.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const SUCCESS_BODY: &str = r#"{"code":"0","msg":"success"}"#;
pub const FAIL_BODY: &str = r#"{"code":"-1","msg":"fail"}"#;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the fixed acknowledgment for a request method.
///
/// Keep-alive is echoed by hyper: a `Connection: close` request gets a
/// `Connection: close` response and the send side is shut down after writing.
pub fn respond(method: &Method) -> Response<Full<Bytes>> {
    let (status, body) = if *method == Method::POST {
        (StatusCode::OK, SUCCESS_BODY)
    } else {
        (StatusCode::BAD_REQUEST, FAIL_BODY)
    };

    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Peer closed, or keep-alive was off and the response went out
    Closed,
    /// No complete request within the read timeout
    TimedOut,
    /// Read or write failed; nothing more is sent
    Aborted(String),
}

/// Why a request was dropped before it could be answered
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request body not received within {0:?}")]
    BodyTimeout(Duration),
    #[error("request body read failed: {0}")]
    Body(#[source] hyper::Error),
}

/// Counters shared by the listener and its sessions
#[derive(Debug, Default)]
pub struct CameraStats {
    pub sessions: AtomicU64,
    pub requests: AtomicU64,
    pub rejected: AtomicU64,
}

pub struct CameraListener {
    listener: TcpListener,
    read_timeout: Duration,
    stats: Arc<CameraStats>,
}

impl CameraListener {
    /// Bind and start listening. A failure here is final; the caller logs it
    /// and carries on without a camera endpoint.
    pub async fn bind(ip: &str, port: u16) -> std::io::Result<Self> {
        let ip: IpAddr = ip
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        Ok(Self {
            listener,
            read_timeout: DEFAULT_READ_TIMEOUT,
            stats: Arc::new(CameraStats::default()),
        })
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> Arc<CameraStats> {
        self.stats.clone()
    }

    /// Accept until shutdown. Accept errors are logged and the loop goes on.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let addr = self.listener.local_addr().ok();
        info!(addr = ?addr, "camera_listener_started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("camera_listener_shutdown");
                        return;
                    }
                }
                result = self.listener.accept() => {
                    match result {
                        Ok((socket, peer)) => {
                            self.stats.sessions.fetch_add(1, Ordering::Relaxed);
                            let stats = self.stats.clone();
                            let read_timeout = self.read_timeout;
                            tokio::spawn(async move {
                                run_session(socket, peer, read_timeout, stats).await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "camera_listener_accept_failed");
                        }
                    }
                }
            }
        }
    }
}

/// Serve one connection to completion
pub async fn run_session(
    socket: TcpStream,
    peer: SocketAddr,
    read_timeout: Duration,
    stats: Arc<CameraStats>,
) -> SessionOutcome {
    debug!(peer = %peer, "camera_session_accepted");

    let service = service_fn(move |req| {
        let stats = stats.clone();
        async move { handle_request(req, peer, read_timeout, stats).await }
    });

    let result = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(read_timeout)
        .keep_alive(true)
        .serve_connection(TokioIo::new(socket), service)
        .await;

    let outcome = match result {
        Ok(()) => SessionOutcome::Closed,
        Err(e) if e.is_timeout() => SessionOutcome::TimedOut,
        Err(e) if is_body_timeout(&e) => SessionOutcome::TimedOut,
        // Peer went away mid-request; same as end of stream
        Err(e) if e.is_incomplete_message() => SessionOutcome::Closed,
        Err(e) => SessionOutcome::Aborted(e.to_string()),
    };

    match &outcome {
        SessionOutcome::Closed => debug!(peer = %peer, "camera_session_closed"),
        SessionOutcome::TimedOut => info!(peer = %peer, "camera_session_timeout"),
        SessionOutcome::Aborted(reason) => {
            error!(peer = %peer, error = %reason, "camera_session_aborted")
        }
    }
    outcome
}

fn is_body_timeout(e: &hyper::Error) -> bool {
    std::error::Error::source(e)
        .and_then(|source| source.downcast_ref::<RequestError>())
        .is_some_and(|e| matches!(e, RequestError::BodyTimeout(_)))
}

/// Read the whole request, then answer it. A body that fails or stalls is an
/// error, so hyper closes the connection without writing a response.
async fn handle_request(
    req: Request<Incoming>,
    peer: SocketAddr,
    read_timeout: Duration,
    stats: Arc<CameraStats>,
) -> Result<Response<Full<Bytes>>, RequestError> {
    let method = req.method().clone();
    info!(peer = %peer, method = %method, path = %req.uri().path(), "camera_request");

    // Body content is diagnostic only
    let body = match tokio::time::timeout(read_timeout, req.into_body().collect()).await {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) => {
            warn!(peer = %peer, error = %e, "camera_request_body_failed");
            return Err(RequestError::Body(e));
        }
        Err(_) => {
            warn!(peer = %peer, "camera_request_body_timeout");
            return Err(RequestError::BodyTimeout(read_timeout));
        }
    };
    debug!(peer = %peer, len = body.len(), body = %String::from_utf8_lossy(&body), "camera_request_body");

    stats.requests.fetch_add(1, Ordering::Relaxed);
    if method != Method::POST {
        stats.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(peer = %peer, method = %method, "camera_request_rejected");
    }
    Ok(respond(&method))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_post_is_success() {
        let response = respond(&Method::POST);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_of(response).await, SUCCESS_BODY);
    }

    #[tokio::test]
    async fn test_other_methods_fail() {
        for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH, Method::HEAD] {
            let response = respond(&method);
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{method}");
            assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
            assert_eq!(body_of(response).await, FAIL_BODY);
        }
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_ip() {
        let err = CameraListener::bind("not-an-ip", 0).await.err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_error() {
        let first = CameraListener::bind("127.0.0.1", 0).await.unwrap();
        let port = first.local_addr().unwrap().port();
        assert!(CameraListener::bind("127.0.0.1", port).await.is_err());
    }
}
