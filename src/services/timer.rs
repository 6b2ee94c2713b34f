//! One-shot and recurring timers
//!
//! `Timer` is a single-shot countdown with at most one pending wait. Its
//! callback may take a payload, which is moved into the wait and handed to
//! the callback on expiry. `stop()` wakes the wait early; that wake is
//! swallowed and the callback never runs.
//!
//! `RecurringTimer` re-arms its `Timer` after every handler run, so the next
//! period starts when the handler returns. There is no catch-up when a
//! handler overruns.
//!
//! Callbacks of one timer run on that timer's `Strand` and never overlap.

use crate::services::strand::Strand;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default)]
struct TimerState {
    running: bool,
    /// Bumped on every start so a stale completion can be told apart
    generation: u64,
    cancel: Option<oneshot::Sender<()>>,
}

/// How a pending wait ended
enum Wake {
    Expired,
    Cancelled,
    /// Cancel channel closed without a stop. The sender lives in `TimerState`
    /// until the wait resolves, so this only guards the channel contract.
    Failed,
}

#[derive(Clone)]
pub struct Timer {
    name: Arc<str>,
    strand: Strand,
    state: Arc<Mutex<TimerState>>,
}

impl Timer {
    /// Timer with its own strand
    pub fn new(name: &str) -> Self {
        Self::with_strand(name, Strand::new(name))
    }

    /// Timer whose callbacks are serialized with other work on `strand`
    pub fn with_strand(name: &str, strand: Strand) -> Self {
        Self { name: Arc::from(name), strand, state: Arc::new(Mutex::new(TimerState::default())) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arm the timer. Returns false (and does nothing) if a wait is pending.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&self, duration: Duration, callback: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.start_with(duration, (), move |()| callback())
    }

    /// Arm the timer with a payload delivered to `callback` on expiry.
    ///
    /// If a wait is pending the payload is dropped and false is returned.
    pub fn start_with<T, F, Fut>(&self, duration: Duration, payload: T, callback: F) -> bool
    where
        T: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let generation = {
            let mut state = self.state.lock();
            if state.running {
                debug!(timer = %self.name, "timer_start_ignored");
                return false;
            }
            state.running = true;
            state.generation += 1;
            state.cancel = Some(cancel_tx);
            state.generation
        };

        trace!(timer = %self.name, secs = duration.as_secs_f64(), "timer_armed");

        let timer = self.clone();
        tokio::spawn(async move {
            let wake = tokio::select! {
                _ = tokio::time::sleep(duration) => Wake::Expired,
                res = cancel_rx => match res {
                    Ok(()) => Wake::Cancelled,
                    Err(_) => Wake::Failed,
                },
            };

            let strand = timer.strand.clone();
            strand
                .run(async move {
                    match wake {
                        Wake::Expired => {
                            // A stop that raced the expiry wins
                            if timer.finish(generation) {
                                callback(payload).await;
                            } else {
                                trace!(timer = %timer.name, "timer_expiry_suppressed");
                            }
                        }
                        Wake::Cancelled => {
                            trace!(timer = %timer.name, "timer_cancelled");
                        }
                        Wake::Failed => {
                            if timer.finish(generation) {
                                error!(timer = %timer.name, "timer_wait_failed");
                            }
                        }
                    }
                })
                .await;
        });

        true
    }

    /// Mark the wait for `generation` complete. False if it was stopped or superseded.
    fn finish(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.running && state.generation == generation {
            state.running = false;
            state.cancel = None;
            true
        } else {
            false
        }
    }

    /// Cancel the pending wait, if any. The callback will not run.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if !state.running {
            return;
        }
        state.running = false;
        if let Some(cancel) = state.cancel.take() {
            // Receiver is gone if the wait already expired; the generation check covers that
            let _ = cancel.send(());
        }
        debug!(timer = %self.name, "timer_stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

type Handler = Arc<dyn Fn() -> BoxFuture + Send + Sync>;

/// Periodic timer built on re-arm-on-fire
#[derive(Clone)]
pub struct RecurringTimer {
    timer: Timer,
    interval: Duration,
    handler: Handler,
    active: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
}

impl RecurringTimer {
    pub fn new<F, Fut>(name: &str, interval: Duration, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            timer: Timer::new(name),
            interval,
            handler: Arc::new(move || -> BoxFuture { Box::pin(handler()) }),
            active: Arc::new(AtomicBool::new(false)),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Begin periodic execution. The first tick fires one interval from now.
    pub fn start(&self) -> bool {
        self.active.store(true, Ordering::Release);
        self.arm()
    }

    fn arm(&self) -> bool {
        let this = self.clone();
        self.timer.start(self.interval, move || async move {
            let tick = this.ticks.fetch_add(1, Ordering::AcqRel) + 1;
            trace!(timer = %this.timer.name(), tick = tick, "recurring_tick");
            (this.handler)().await;
            if this.active.load(Ordering::Acquire) {
                this.arm();
            }
        })
    }

    /// Stop re-arming and cancel the pending wait
    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
        self.timer.stop();
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Number of handler runs since creation
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
