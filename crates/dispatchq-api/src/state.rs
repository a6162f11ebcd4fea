//! Application state.

use std::sync::Arc;
use std::time::Instant;

use dispatchq_queue::QueueEngine;

/// Application state shared across handlers.
pub struct AppState {
    pub engine: Arc<QueueEngine>,
    start_time: Instant,
}

impl AppState {
    pub fn new(engine: Arc<QueueEngine>) -> Self {
        Self {
            engine,
            start_time: Instant::now(),
        }
    }

    /// Get uptime.
    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}
