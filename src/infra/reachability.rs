//! Central backend reachability flag
//!
//! The only mutable state shared across components. Written by the central
//! dispatcher after every send attempt, read by store/replay logic to decide
//! whether records must be queued for later.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct CentralReachability {
    reachable: Arc<AtomicBool>,
}

impl CentralReachability {
    /// Starts unreachable until the first successful exchange
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    /// Record the outcome of a send. Returns the previous value.
    pub fn record(&self, reachable: bool) -> bool {
        let previous = self.reachable.swap(reachable, Ordering::AcqRel);
        if previous != reachable {
            if reachable {
                info!("central_reachable");
            } else {
                warn!("central_unreachable");
            }
        }
        previous
    }
}
