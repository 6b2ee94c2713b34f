//! Outbound HTTP session to the central backend
//!
//! One `run` is one exchange: resolve → connect → write request → read
//! response → shutdown both directions. Every stage has its own failure
//! label so callers can log where an exchange broke. No retries here; retry
//! policy belongs to the dispatcher.
//!
//! A session is reused across calls to the same endpoint, but `run` takes
//! `&mut self`, so two exchanges on one session never overlap.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper::header::{CONTENT_TYPE, HOST, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, error, warn};

pub const USER_AGENT_VALUE: &str = concat!("lot-hub/", env!("CARGO_PKG_VERSION"));

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where an exchange failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Connect,
    Write,
    Read,
    Shutdown,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Resolve => "Resolve Error",
            Stage::Connect => "Connect Error",
            Stage::Write => "Write Error",
            Stage::Read => "Read Error",
            Stage::Shutdown => "Shutdown Error",
        }
    }
}

pub const STATUS_NOT_OK: &str = "Status Not Ok";

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Network failure; the exchange was aborted at `stage`
    #[error("{}: {}", .stage.label(), .source)]
    Transport {
        stage: Stage,
        #[source]
        source: BoxError,
    },
    /// The exchange completed but central did not answer 200
    #[error("{}: {}", STATUS_NOT_OK, .0)]
    StatusNotOk(StatusCode),
    /// The body could not be serialized; nothing was sent
    #[error("Encode Error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ExchangeError {
    fn at(stage: Stage, source: impl Into<BoxError>) -> Self {
        ExchangeError::Transport { stage, source: source.into() }
    }

    fn timed_out(stage: Stage) -> Self {
        Self::at(stage, std::io::Error::new(ErrorKind::TimedOut, "operation timed out"))
    }

    /// Human readable stage ("Connect Error", "Status Not Ok", ...)
    pub fn stage_label(&self) -> &'static str {
        match self {
            ExchangeError::Transport { stage, .. } => stage.label(),
            ExchangeError::StatusNotOk(_) => STATUS_NOT_OK,
            ExchangeError::Encode(_) => "Encode Error",
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            ExchangeError::Transport { stage, .. } => Some(*stage),
            ExchangeError::StatusNotOk(_) | ExchangeError::Encode(_) => None,
        }
    }

    /// Underlying transport error; `None` for a non-200 status
    pub fn transport_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            ExchangeError::Transport { source, .. } => Some(source.as_ref()),
            ExchangeError::StatusNotOk(_) | ExchangeError::Encode(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Applies to resolve, request write/response read and shutdown
    pub io_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(10),
        }
    }
}

/// Reusable client state machine for one central endpoint
pub struct ClientSession {
    config: SessionConfig,
    exchanges: u64,
    last_status: Option<StatusCode>,
}

impl ClientSession {
    pub fn new(config: SessionConfig) -> Self {
        Self { config, exchanges: 0, last_status: None }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of `run` calls so far
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Status of the most recent response, if one was read
    pub fn last_status(&self) -> Option<StatusCode> {
        self.last_status
    }

    /// POST `body` as JSON to `target` and return the response body on 200
    pub async fn run(&mut self, target: &str, body: String) -> Result<Bytes, ExchangeError> {
        self.exchanges += 1;
        self.last_status = None;

        let result = self.exchange(target, body).await;
        match &result {
            Ok(_) => debug!(path = %target, "central_exchange_ok"),
            Err(e @ ExchangeError::StatusNotOk(_)) => {
                warn!(path = %target, error = %e, "central_exchange_status_not_ok")
            }
            Err(e) => {
                error!(path = %target, stage = %e.stage_label(), error = %e, "central_exchange_failed")
            }
        }
        result
    }

    async fn exchange(&mut self, target: &str, body: String) -> Result<Bytes, ExchangeError> {
        let addrs = self.resolve().await?;
        let stream = self.connect(&addrs).await?;
        let (status, response_body, stream) = self.write_and_read(stream, target, body).await?;
        self.last_status = Some(status);

        if let Some(stream) = stream {
            shutdown_both(stream)?;
        }

        if status != StatusCode::OK {
            return Err(ExchangeError::StatusNotOk(status));
        }
        Ok(response_body)
    }

    async fn resolve(&self) -> Result<Vec<SocketAddr>, ExchangeError> {
        let host = self.config.host.as_str();
        let lookup = lookup_host((host, self.config.port));
        let addrs: Vec<SocketAddr> = tokio::time::timeout(self.config.io_timeout, lookup)
            .await
            .map_err(|_| ExchangeError::timed_out(Stage::Resolve))?
            .map_err(|e| ExchangeError::at(Stage::Resolve, e))?
            .collect();

        if addrs.is_empty() {
            return Err(ExchangeError::at(Stage::Resolve, format!("no addresses for {host}")));
        }
        Ok(addrs)
    }

    /// Try each resolved address in turn within one overall timeout
    async fn connect(&self, addrs: &[SocketAddr]) -> Result<TcpStream, ExchangeError> {
        let attempt = async {
            let mut last_err = None;
            for addr in addrs {
                match TcpStream::connect(*addr).await {
                    Ok(stream) => return Ok(stream),
                    Err(e) => {
                        debug!(addr = %addr, error = %e, "central_connect_attempt_failed");
                        last_err = Some(e);
                    }
                }
            }
            Err(last_err.unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "no address")))
        };

        let stream = tokio::time::timeout(self.config.connect_timeout, attempt)
            .await
            .map_err(|_| ExchangeError::timed_out(Stage::Connect))?
            .map_err(|e| ExchangeError::at(Stage::Connect, e))?;

        // Small JSON bodies; don't wait on Nagle
        stream.set_nodelay(true).map_err(|e| ExchangeError::at(Stage::Connect, e))?;
        Ok(stream)
    }

    /// Send the request and read the full response.
    ///
    /// Returns the stream for shutdown unless the connection already ended.
    async fn write_and_read(
        &self,
        stream: TcpStream,
        target: &str,
        body: String,
    ) -> Result<(StatusCode, Bytes, Option<TcpStream>), ExchangeError> {
        let io_timeout = self.config.io_timeout;

        let request = Request::builder()
            .method(Method::POST)
            .uri(target)
            .header(HOST, self.config.host.as_str())
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| ExchangeError::at(Stage::Write, e))?;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| ExchangeError::at(Stage::Write, e))?;

        let round_trip = async move {
            let response = tokio::time::timeout(io_timeout, sender.send_request(request))
                .await
                .map_err(|_| ExchangeError::timed_out(Stage::Read))?
                .map_err(classify_send_error)?;

            let status = response.status();
            let collected = tokio::time::timeout(io_timeout, response.into_body().collect())
                .await
                .map_err(|_| ExchangeError::timed_out(Stage::Read))?
                .map_err(|e| ExchangeError::at(Stage::Read, e))?;

            // Dropping the sender lets the connection wind down
            drop(sender);
            Ok::<_, ExchangeError>((status, collected.to_bytes()))
        };

        // Drive the connection and the request on this task, never in parallel
        let (conn_result, round_trip_result) = tokio::time::timeout(
            io_timeout * 3,
            async move { tokio::join!(conn.without_shutdown(), round_trip) },
        )
        .await
        .map_err(|_| ExchangeError::timed_out(Stage::Read))?;

        let (status, response_body) = round_trip_result?;
        debug!(
            status = %status.as_u16(),
            body = %String::from_utf8_lossy(&response_body),
            "central_response"
        );

        let stream = match conn_result {
            Ok(parts) => Some(parts.io.into_inner()),
            Err(e) => {
                debug!(error = %e, "central_connection_closed_early");
                None
            }
        };

        Ok((status, response_body, stream))
    }
}

/// Failures before the response head. hyper reports a bad or truncated
/// response as parse / incomplete-message; anything else failed while sending.
fn classify_send_error(e: hyper::Error) -> ExchangeError {
    if e.is_parse() || e.is_parse_status() || e.is_incomplete_message() || e.is_timeout() {
        ExchangeError::at(Stage::Read, e)
    } else {
        ExchangeError::at(Stage::Write, e)
    }
}

/// Shut down both directions. A peer that already went away is not an error.
fn shutdown_both(stream: TcpStream) -> Result<(), ExchangeError> {
    let stream = stream.into_std().map_err(|e| ExchangeError::at(Stage::Shutdown, e))?;
    shutdown_result(stream.shutdown(Shutdown::Both))
}

fn shutdown_result(result: std::io::Result<()>) -> Result<(), ExchangeError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotConnected => {
            debug!("central_shutdown_not_connected");
            Ok(())
        }
        Err(e) => Err(ExchangeError::at(Stage::Shutdown, e)),
    }
}
