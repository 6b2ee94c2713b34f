//! Timer orchestrator
//!
//! Owns the five timers that decide when telemetry goes to central:
//! - heartbeat (recurring)
//! - device status (recurring, reports the latest status code)
//! - three debounce filters, one per tracked parking lot event
//!
//! A filter holds its event until the window closes, then reports it. Sends
//! that fail are written to the store for later replay.

use crate::domain::{DeviceStatusCode, FilterSlot, ParkingLotEvent};
use crate::infra::config::Config;
use crate::infra::store::LotStore;
use crate::services::central::TelemetrySink;
use crate::services::timer::{RecurringTimer, Timer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct TimerOrchestrator {
    heartbeat: RecurringTimer,
    device_status: RecurringTimer,
    filters: [Timer; 3],
    filter_window: Duration,
    status_tx: watch::Sender<DeviceStatusCode>,
    sink: Arc<dyn TelemetrySink>,
    store: Arc<dyn LotStore>,
}

impl TimerOrchestrator {
    pub fn new(
        config: &Config,
        device_ip: &str,
        sink: Arc<dyn TelemetrySink>,
        store: Arc<dyn LotStore>,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(DeviceStatusCode::Recovered);

        let heartbeat = {
            let sink = sink.clone();
            RecurringTimer::new("heartbeat", config.heartbeat_interval(), move || {
                let sink = sink.clone();
                async move {
                    if !sink.heartbeat().await {
                        debug!("heartbeat_not_delivered");
                    }
                }
            })
        };

        let device_status = {
            let sink = sink.clone();
            let store = store.clone();
            let carpark: Arc<str> = Arc::from(config.carpark_code());
            let device_ip: Arc<str> = Arc::from(device_ip);
            RecurringTimer::new("device_status", config.device_status_interval(), move || {
                let sink = sink.clone();
                let store = store.clone();
                let carpark = carpark.clone();
                let device_ip = device_ip.clone();
                let code = *status_rx.borrow();
                async move {
                    if sink.device_status(&device_ip, code).await {
                        return;
                    }
                    if store.insert_status(&carpark, &device_ip, code) {
                        info!(code = %code, "device_status_stored_for_retry");
                    } else {
                        error!(code = %code, "device_status_store_failed");
                    }
                }
            })
        };

        Self {
            heartbeat,
            device_status,
            filters: FilterSlot::ALL.map(|slot| Timer::new(&format!("filter_{slot}"))),
            filter_window: config.filter_snapshot_interval(),
            status_tx,
            sink,
            store,
        }
    }

    /// Start both recurring timers
    pub fn start(&self) {
        self.heartbeat.start();
        self.device_status.start();
        info!(
            heartbeat_secs = self.heartbeat.interval().as_secs(),
            device_status_secs = self.device_status.interval().as_secs(),
            filter_secs = self.filter_window.as_secs(),
            "timers_started"
        );
    }

    /// Stop every timer. Events held by running filters are discarded.
    pub fn stop(&self) {
        self.heartbeat.stop();
        self.device_status.stop();
        for filter in &self.filters {
            filter.stop();
        }
        info!("timers_stopped");
    }

    /// Status code reported on the next device-status tick
    pub fn set_device_status(&self, code: DeviceStatusCode) {
        let previous = self.status_tx.send_replace(code);
        if previous != code {
            info!(from = %previous, to = %code, "device_status_changed");
        }
    }

    pub fn device_status(&self) -> DeviceStatusCode {
        *self.status_tx.borrow()
    }

    /// Open the debounce window for `slot` with `event`.
    ///
    /// If the window is already open the new event is dropped and false is
    /// returned.
    pub fn start_filter(&self, slot: FilterSlot, event: ParkingLotEvent) -> bool {
        let summary = event.to_string();
        let sink = self.sink.clone();
        let store = self.store.clone();

        let armed = self.filters[slot.index()].start_with(
            self.filter_window,
            event,
            move |event| async move {
                debug!(slot = %slot, event = %event, "filter_expired");
                if sink.park_event(&event).await {
                    return;
                }
                if store.insert_transaction(&event) {
                    info!(slot = %slot, event = %event, "park_event_stored_for_retry");
                } else {
                    error!(slot = %slot, event = %event, "park_event_store_failed");
                }
            },
        );

        if armed {
            debug!(slot = %slot, event = %summary, "filter_started");
        } else {
            warn!(slot = %slot, event = %summary, "filter_busy_event_dropped");
        }
        armed
    }

    /// Close the window for `slot` without reporting its event
    pub fn stop_filter(&self, slot: FilterSlot) {
        self.filters[slot.index()].stop();
    }

    pub fn is_filter_running(&self, slot: FilterSlot) -> bool {
        self.filters[slot.index()].is_running()
    }

    pub fn heartbeat_timer(&self) -> &RecurringTimer {
        &self.heartbeat
    }

    pub fn device_status_timer(&self) -> &RecurringTimer {
        &self.device_status
    }
}
