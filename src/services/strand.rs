//! Serialization domain for async work
//!
//! Work submitted to the same `Strand` runs one item at a time, in the order
//! it was submitted, on whichever worker thread picks it up. Work on
//! different strands runs in parallel.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;

#[derive(Clone)]
pub struct Strand {
    name: Arc<str>,
    // tokio's mutex grants the lock in FIFO order
    lane: Arc<Mutex<()>>,
}

impl Strand {
    pub fn new(name: &str) -> Self {
        Self { name: Arc::from(name), lane: Arc::new(Mutex::new(())) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `work` once every earlier submission on this strand has finished
    pub async fn run<F: Future>(&self, work: F) -> F::Output {
        let _turn = self.lane.lock().await;
        trace!(strand = %self.name(), "strand_turn");
        work.await
    }
}

impl std::fmt::Debug for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strand").field("name", &self.name).finish()
    }
}
