//! Pipeline counters.
//!
//! Lock-free counters updated by every job and exposed through the health
//! endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Conversion metrics collector.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    jobs_started: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_timed_out: AtomicU64,
    compression_fallbacks: AtomicU64,
    bytes_delivered: AtomicU64,
    total_duration_ms: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Jobs that entered the pipeline.
    pub jobs_started: u64,
    /// Jobs that produced a deliverable.
    pub jobs_succeeded: u64,
    /// Jobs that failed (timeouts included).
    pub jobs_failed: u64,
    /// Jobs whose failing stage timed out.
    pub jobs_timed_out: u64,
    /// Jobs that returned the raw STEP because compression failed.
    pub compression_fallbacks: u64,
    /// Sum of deliverable sizes.
    pub bytes_delivered: u64,
    /// Mean duration of successful jobs.
    pub avg_duration_ms: u64,
}

impl PipelineMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a job entering the pipeline.
    pub fn record_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful job.
    pub fn record_success(&self, duration: Duration, delivered_bytes: u64) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        self.bytes_delivered
            .fetch_add(delivered_bytes, Ordering::Relaxed);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a failed job.
    pub fn record_failure(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job failed by a stage timeout.
    pub fn record_timeout(&self) {
        self.jobs_timed_out.fetch_add(1, Ordering::Relaxed);
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a compression fallback.
    pub fn record_compression_fallback(&self) {
        self.compression_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let succeeded = self.jobs_succeeded.load(Ordering::Relaxed);
        let total_ms = self.total_duration_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_succeeded: succeeded,
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_timed_out: self.jobs_timed_out.load(Ordering::Relaxed),
            compression_fallbacks: self.compression_fallbacks.load(Ordering::Relaxed),
            bytes_delivered: self.bytes_delivered.load(Ordering::Relaxed),
            avg_duration_ms: if succeeded == 0 { 0 } else { total_ms / succeeded },
        }
    }
}
