//! Central dispatcher
//!
//! Builds the JSON bodies for the three central endpoints and sends them over
//! one long-lived client session per endpoint. Every attempt updates the
//! shared reachability flag. Retries follow an explicit `RetryPolicy`; the
//! async path defaults to a single attempt and leaves re-sending to the next
//! timer tick.

use crate::domain::payload::{
    DeviceStatusPayload, Endpoint, HeartbeatPayload, ParkInOutFields, ParkInOutPayload,
};
use crate::domain::{Credentials, DeviceStatusCode, ParkingLotEvent};
use crate::infra::config::Config;
use crate::infra::host;
use crate::infra::reachability::CentralReachability;
use crate::io::central_session::{ClientSession, ExchangeError, SessionConfig};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Where timer handlers send telemetry
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn heartbeat(&self) -> bool;
    async fn device_status(&self, device_ip: &str, code: DeviceStatusCode) -> bool;
    async fn park_event(&self, event: &ParkingLotEvent) -> bool;
}

/// Bounded retry: at most `max_attempts` exchanges, `backoff` between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff }
    }

    /// One attempt, no retry
    pub fn single() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Three back-to-back attempts, as the blocking sender always did
    pub fn legacy() -> Self {
        Self::new(3, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single()
    }
}

#[derive(Debug)]
pub struct SendOutcome {
    pub endpoint: Endpoint,
    pub attempts: u32,
    pub result: Result<Bytes, ExchangeError>,
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Empty on success, otherwise the stage of the last failure
    pub fn stage_label(&self) -> &'static str {
        match &self.result {
            Ok(_) => "",
            Err(e) => e.stage_label(),
        }
    }
}

pub struct CentralDispatcher {
    carpark_code: String,
    credentials: Credentials,
    // Indexed by `Endpoint::index`; the mutex is the session's serialization domain
    sessions: [Mutex<ClientSession>; 3],
    reachability: CentralReachability,
    policy: RetryPolicy,
}

impl CentralDispatcher {
    pub fn new(config: &Config, reachability: CentralReachability) -> Self {
        let session = || {
            let mut session_config = SessionConfig::new(config.central_host(), config.central_port());
            session_config.connect_timeout = config.connect_timeout();
            session_config.io_timeout = config.io_timeout();
            Mutex::new(ClientSession::new(session_config))
        };

        Self {
            carpark_code: config.carpark_code().to_string(),
            credentials: config.credentials().clone(),
            sessions: [session(), session(), session()],
            reachability,
            policy: RetryPolicy::single(),
        }
    }

    /// Policy used by the `send_*` helpers
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn reachability(&self) -> &CentralReachability {
        &self.reachability
    }

    pub fn carpark_code(&self) -> &str {
        &self.carpark_code
    }

    /// POST `body` to `endpoint`, retrying per `policy`.
    ///
    /// Calls to the same endpoint queue behind each other; different
    /// endpoints proceed in parallel.
    pub async fn send(&self, endpoint: Endpoint, body: String, policy: RetryPolicy) -> SendOutcome {
        let mut session = self.sessions[endpoint.index()].lock().await;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let result = session.run(endpoint.path(), body.clone()).await;
            self.reachability.record(result.is_ok());

            match &result {
                Ok(_) => {
                    info!(endpoint = %endpoint, attempts = attempts, "central_send_ok");
                }
                Err(e) if attempts < policy.max_attempts => {
                    warn!(
                        endpoint = %endpoint,
                        attempt = attempts,
                        stage = %e.stage_label(),
                        "central_send_retry"
                    );
                    if !policy.backoff.is_zero() {
                        tokio::time::sleep(policy.backoff).await;
                    }
                    continue;
                }
                Err(e) => {
                    warn!(
                        endpoint = %endpoint,
                        attempts = attempts,
                        stage = %e.stage_label(),
                        error = %e,
                        "central_send_failed"
                    );
                }
            }
            return SendOutcome { endpoint, attempts, result };
        }
    }

    pub async fn send_heartbeat(&self) -> SendOutcome {
        self.send_heartbeat_at(&host::now_timestamp()).await
    }

    /// Heartbeat stamped with `heartbeat_dt` ("YYYY-MM-DD HH:MM:SS")
    pub async fn send_heartbeat_at(&self, heartbeat_dt: &str) -> SendOutcome {
        let payload = HeartbeatPayload::new(&self.credentials, &self.carpark_code, heartbeat_dt);
        self.send_json(Endpoint::HeartBeat, &payload, None).await
    }

    pub async fn send_device_status(&self, device_ip: &str, code: DeviceStatusCode) -> SendOutcome {
        let payload = DeviceStatusPayload::new(&self.credentials, &self.carpark_code, device_ip, code);
        self.send_json(Endpoint::DeviceStatus, &payload, None).await
    }

    /// Report a park-in/out. Snapshot files are read and encoded now, so the
    /// event only ever holds paths.
    pub async fn send_park_event(&self, event: &ParkingLotEvent) -> SendOutcome {
        let fields = ParkInOutFields {
            lot_no: event.lot_no.clone(),
            lpn: event.license_plate.clone(),
            lot_in_image: host::encode_image_file(&event.lot_in_image_ref).await,
            lot_out_image: host::encode_image_file(&event.lot_out_image_ref).await,
            lot_in_time: event.lot_in_time.clone(),
            lot_out_time: event.lot_out_time.clone(),
        };
        debug!(
            event = %event,
            direction = if event.is_park_out() { "out" } else { "in" },
            "central_park_event"
        );
        let payload = ParkInOutPayload::new(&self.credentials, &self.carpark_code, &fields);
        let shown = serde_json::to_string(&payload.redacted()).ok();
        self.send_json(Endpoint::ParkInOut, &payload, shown).await
    }

    /// Serialize and send; `shown` replaces the body in the request log
    async fn send_json<T: Serialize>(
        &self,
        endpoint: Endpoint,
        payload: &T,
        shown: Option<String>,
    ) -> SendOutcome {
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "central_encode_failed");
                return SendOutcome { endpoint, attempts: 0, result: Err(e.into()) };
            }
        };

        info!(endpoint = %endpoint, body = %shown.as_deref().unwrap_or(&body), "central_request");

        let outcome = self.send(endpoint, body, self.policy).await;
        if let Ok(response) = &outcome.result {
            debug!(endpoint = %endpoint, response = %String::from_utf8_lossy(response), "central_response_body");
        }
        outcome
    }
}

#[async_trait]
impl TelemetrySink for CentralDispatcher {
    async fn heartbeat(&self) -> bool {
        self.send_heartbeat().await.is_success()
    }

    async fn device_status(&self, device_ip: &str, code: DeviceStatusCode) -> bool {
        self.send_device_status(device_ip, code).await.is_success()
    }

    async fn park_event(&self, event: &ParkingLotEvent) -> bool {
        self.send_park_event(event).await.is_success()
    }
}

/// Synchronous sender for callers outside the async runtime.
///
/// Owns a current-thread runtime and drives the async dispatcher on the
/// calling thread with the legacy three-attempt policy. Calling it from inside
/// a tokio runtime panics, and callers must not use one instance from several
/// threads at once.
pub struct BlockingCentral {
    runtime: tokio::runtime::Runtime,
    dispatcher: CentralDispatcher,
}

impl BlockingCentral {
    pub fn new(config: &Config, reachability: CentralReachability) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        let dispatcher =
            CentralDispatcher::new(config, reachability).with_policy(RetryPolicy::legacy());
        Ok(Self { runtime, dispatcher })
    }

    pub fn dispatcher(&self) -> &CentralDispatcher {
        &self.dispatcher
    }

    pub fn send(&self, endpoint: Endpoint, body: String) -> SendOutcome {
        self.runtime.block_on(self.dispatcher.send(endpoint, body, RetryPolicy::legacy()))
    }

    pub fn send_heartbeat(&self) -> bool {
        self.runtime.block_on(self.dispatcher.send_heartbeat()).is_success()
    }

    pub fn send_device_status(&self, device_ip: &str, code: DeviceStatusCode) -> bool {
        self.runtime.block_on(self.dispatcher.send_device_status(device_ip, code)).is_success()
    }

    pub fn send_park_event(&self, event: &ParkingLotEvent) -> bool {
        self.runtime.block_on(self.dispatcher.send_park_event(event)).is_success()
    }
}
