//! Engine statistics: lock-free counters shared with API handlers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Lock-free request counters.
pub struct EngineStats {
    pub total_requests: AtomicU64,
    pub completed_requests: AtomicU64,
    /// Requests answered with 400 (missing field, undecodable image).
    pub rejected_requests: AtomicU64,
    /// Requests answered with 500 (dataset I/O, model failure).
    pub failed_requests: AtomicU64,
    pub samples_logged: AtomicU64,
    pub total_inference_time_us: AtomicU64,
    started_at: Instant,
}

impl EngineStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            completed_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            samples_logged: AtomicU64::new(0),
            total_inference_time_us: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Snapshot for JSON serialization.
    pub fn snapshot(&self) -> StatsSnapshot {
        let completed = self.completed_requests.load(Ordering::Relaxed);
        let total_us = self.total_inference_time_us.load(Ordering::Relaxed);
        let avg_inference_ms = if completed > 0 {
            total_us as f64 / completed as f64 / 1000.0
        } else {
            0.0
        };
        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            completed_requests: completed,
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            samples_logged: self.samples_logged.load(Ordering::Relaxed),
            avg_inference_ms,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub completed_requests: u64,
    pub rejected_requests: u64,
    pub failed_requests: u64,
    pub samples_logged: u64,
    pub avg_inference_ms: f64,
    pub uptime_secs: u64,
}
