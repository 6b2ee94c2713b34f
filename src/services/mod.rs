//! Services - timing and dispatch logic
//!
//! - `strand` - Serialization domain for async work
//! - `timer` - One-shot and recurring timers
//! - `orchestrator` - Heartbeat, device-status and debounce timers
//! - `central` - Central dispatcher, retry policy and blocking facade

pub mod central;
pub mod orchestrator;
pub mod strand;
pub mod timer;

// Re-export commonly used types
pub use central::{BlockingCentral, CentralDispatcher, RetryPolicy, SendOutcome, TelemetrySink};
pub use orchestrator::TimerOrchestrator;
pub use strand::Strand;
pub use timer::{RecurringTimer, Timer};
