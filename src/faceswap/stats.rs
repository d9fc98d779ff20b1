use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default)]
struct StatsInner {
    total_requests: u64,
    successful_swaps: u64,
    failed_swaps: u64,
    average_processing_time_ms: f64,
}

/// Point-in-time copy of the counters, serialized for the stats endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub successful_swaps: u64,
    pub failed_swaps: u64,
    pub average_processing_time_ms: f64,
}

/// Monotonic per-client counters. One handle is owned by the client
/// instance and cloned to anyone who needs visibility; counters reset
/// only on explicit operator action.
#[derive(Clone, Default)]
pub struct ClientStats {
    inner: Arc<Mutex<StatsInner>>,
}

impl ClientStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.total_requests += 1;
    }

    /// Folds one successful job into the counters. The average is the
    /// incremental arithmetic mean over successful jobs only.
    pub fn record_success(&self, elapsed: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.successful_swaps += 1;
        let n = inner.successful_swaps as f64;
        let elapsed_ms = elapsed.as_millis() as f64;
        inner.average_processing_time_ms =
            (inner.average_processing_time_ms * (n - 1.0) + elapsed_ms) / n;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failed_swaps += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().unwrap();
        StatsSnapshot {
            total_requests: inner.total_requests,
            successful_swaps: inner.successful_swaps,
            failed_swaps: inner.failed_swaps,
            average_processing_time_ms: inner.average_processing_time_ms,
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = StatsInner::default();
    }
}
