// ═══════════════════════════════════════════════════════════════
// FETCH METRICS - Because if you can't count the retries, you can't
// explain the latency
// ═══════════════════════════════════════════════════════════════
//
// Atomic counters for every outcome of an upstream call. Each Fetcher owns
// its own set; nothing here is shared between requests unless the caller
// shares the Fetcher. The CLI dumps a snapshot at debug level after each run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// A point-in-time copy of the counters, ready for JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchMetricsSnapshot {
    pub requests_sent: u64,
    pub successes: u64,
    pub retries: u64,
    pub rate_limited: u64,
    pub not_found: u64,
    pub failures: u64,
    pub uptime_seconds: u64,
}

/// Lock-free counters for one Fetcher.
pub struct FetchMetrics {
    requests_sent: AtomicU64,
    successes: AtomicU64,
    retries: AtomicU64,
    rate_limited: AtomicU64,
    not_found: AtomicU64,
    failures: AtomicU64,
    start_time: Instant,
}

impl FetchMetrics {
    pub fn new() -> Self {
        Self {
            requests_sent: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            not_found: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn increment_requests(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_successes(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// A fetch that ended in an Upstream error.
    pub fn increment_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FetchMetricsSnapshot {
        FetchMetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for FetchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let snap = FetchMetrics::new().snapshot();
        assert_eq!(snap.requests_sent, 0);
        assert_eq!(snap.failures, 0);
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = FetchMetrics::new();
        metrics.increment_requests();
        metrics.increment_requests();
        metrics.increment_retries();
        metrics.increment_successes();
        let snap = metrics.snapshot();
        assert_eq!(snap.requests_sent, 2);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.rate_limited, 0);
    }
}
