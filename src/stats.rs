//! Statistics module for diagnostic counters.
//!
//! These counters are the only mutable state shared between requests, so
//! every field is an atomic updated with relaxed ordering. Nothing here feeds
//! back into request handling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Relaxed ordering for stats - we don't need strict ordering guarantees
const ORDERING: Ordering = Ordering::Relaxed;

/// Process-wide request counters
#[derive(Debug)]
pub struct Stats {
    /// Server start time
    start_time: Instant,

    // Request counters
    /// Requests that reached the chat completion handler
    pub total_requests: AtomicU64,
    /// Requests currently being served (in-flight)
    pub active_requests: AtomicU64,
    /// Accepted streaming requests
    pub streaming_requests: AtomicU64,
    /// Accepted non-streaming requests
    pub non_streaming_requests: AtomicU64,
    /// Requests that emitted every token
    pub completed_requests: AtomicU64,
    /// Requests stopped by client disconnect or deadline
    pub cancelled_requests: AtomicU64,
    /// Requests rejected with a 4xx
    pub rejected_requests: AtomicU64,
    /// Requests that failed with a 5xx
    pub failed_requests: AtomicU64,

    // Token counters
    /// Total prompt tokens of completed requests
    pub prompt_tokens: AtomicU64,
    /// Total completion tokens of completed requests
    pub completion_tokens: AtomicU64,

    // Latency tracking (in microseconds)
    total_latency_us: AtomicU64,
    min_latency_us: AtomicU64,
    max_latency_us: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    /// Create a new Stats instance
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            active_requests: AtomicU64::new(0),
            streaming_requests: AtomicU64::new(0),
            non_streaming_requests: AtomicU64::new(0),
            completed_requests: AtomicU64::new(0),
            cancelled_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            prompt_tokens: AtomicU64::new(0),
            completion_tokens: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            min_latency_us: AtomicU64::new(u64::MAX),
            max_latency_us: AtomicU64::new(0),
        }
    }

    /// Record a request entering the handler.
    ///
    /// The returned guard keeps the request counted as active until it is
    /// dropped, whichever way the request ends.
    pub fn enter(self: &Arc<Self>) -> ActiveGuard {
        self.total_requests.fetch_add(1, ORDERING);
        self.active_requests.fetch_add(1, ORDERING);
        ActiveGuard {
            stats: Arc::clone(self),
        }
    }

    /// Record that a request passed validation
    pub fn record_accepted(&self, is_streaming: bool) {
        if is_streaming {
            self.streaming_requests.fetch_add(1, ORDERING);
        } else {
            self.non_streaming_requests.fetch_add(1, ORDERING);
        }
    }

    /// Record an error response
    pub fn record_error(&self, status_code: u16) {
        if status_code < 500 {
            self.rejected_requests.fetch_add(1, ORDERING);
        } else {
            self.failed_requests.fetch_add(1, ORDERING);
        }
    }

    /// Record a request whose emission was cut short
    pub fn record_cancelled(&self) {
        self.cancelled_requests.fetch_add(1, ORDERING);
    }

    /// Record the completion of a request
    pub fn record_completed(&self, latency: Duration, prompt_tokens: u32, completion_tokens: u32) {
        self.completed_requests.fetch_add(1, ORDERING);

        self.prompt_tokens.fetch_add(prompt_tokens as u64, ORDERING);
        self.completion_tokens
            .fetch_add(completion_tokens as u64, ORDERING);

        let latency_us = latency.as_micros() as u64;
        self.total_latency_us.fetch_add(latency_us, ORDERING);
        self.min_latency_us.fetch_min(latency_us, ORDERING);
        self.max_latency_us.fetch_max(latency_us, ORDERING);
    }

    /// Get the uptime of the server
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get average latency of completed requests in milliseconds
    pub fn avg_latency_ms(&self) -> f64 {
        let completed = self.completed_requests.load(ORDERING);
        if completed == 0 {
            return 0.0;
        }
        let total_us = self.total_latency_us.load(ORDERING);
        (total_us as f64 / completed as f64) / 1000.0
    }

    /// Get minimum latency in milliseconds
    pub fn min_latency_ms(&self) -> Option<f64> {
        let min = self.min_latency_us.load(ORDERING);
        if min == u64::MAX {
            None
        } else {
            Some(min as f64 / 1000.0)
        }
    }

    /// Get maximum latency in milliseconds
    pub fn max_latency_ms(&self) -> Option<f64> {
        if self.completed_requests.load(ORDERING) == 0 {
            None
        } else {
            Some(self.max_latency_us.load(ORDERING) as f64 / 1000.0)
        }
    }

    /// Get a snapshot of all stats for serialization
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            total_requests: self.total_requests.load(ORDERING),
            active_requests: self.active_requests.load(ORDERING),
            streaming_requests: self.streaming_requests.load(ORDERING),
            non_streaming_requests: self.non_streaming_requests.load(ORDERING),
            completed_requests: self.completed_requests.load(ORDERING),
            cancelled_requests: self.cancelled_requests.load(ORDERING),
            rejected_requests: self.rejected_requests.load(ORDERING),
            failed_requests: self.failed_requests.load(ORDERING),
            prompt_tokens: self.prompt_tokens.load(ORDERING),
            completion_tokens: self.completion_tokens.load(ORDERING),
            avg_latency_ms: self.avg_latency_ms(),
            min_latency_ms: self.min_latency_ms(),
            max_latency_ms: self.max_latency_ms(),
        }
    }
}

/// Keeps a request counted in `active_requests` until dropped
#[derive(Debug)]
pub struct ActiveGuard {
    stats: SharedStats,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.stats.active_requests.fetch_sub(1, ORDERING);
    }
}

/// A serializable snapshot of statistics
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub active_requests: u64,
    pub streaming_requests: u64,
    pub non_streaming_requests: u64,
    pub completed_requests: u64,
    pub cancelled_requests: u64,
    pub rejected_requests: u64,
    pub failed_requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
}

/// Shared stats handle for use across threads
pub type SharedStats = Arc<Stats>;

/// Create a new shared stats instance
pub fn new_shared_stats() -> SharedStats {
    Arc::new(Stats::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_active_guard() {
        let stats = new_shared_stats();

        let first = stats.enter();
        let second = stats.enter();
        assert_eq!(stats.total_requests.load(ORDERING), 2);
        assert_eq!(stats.active_requests.load(ORDERING), 2);

        drop(first);
        assert_eq!(stats.active_requests.load(ORDERING), 1);
        drop(second);
        assert_eq!(stats.active_requests.load(ORDERING), 0);
        assert_eq!(stats.total_requests.load(ORDERING), 2);
    }

    #[test]
    fn test_stats_completed() {
        let stats = new_shared_stats();

        let guard = stats.enter();
        stats.record_accepted(false);
        stats.record_completed(Duration::from_millis(100), 50, 100);
        drop(guard);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.non_streaming_requests, 1);
        assert_eq!(snapshot.completed_requests, 1);
        assert_eq!(snapshot.prompt_tokens, 50);
        assert_eq!(snapshot.completion_tokens, 100);
        assert_eq!(snapshot.active_requests, 0);
    }

    #[test]
    fn test_stats_errors() {
        let stats = Stats::new();
        stats.record_error(400);
        stats.record_error(400);
        stats.record_error(500);

        assert_eq!(stats.rejected_requests.load(ORDERING), 2);
        assert_eq!(stats.failed_requests.load(ORDERING), 1);
    }

    #[test]
    fn test_stats_latency() {
        let stats = Stats::new();
        assert_eq!(stats.min_latency_ms(), None);
        assert_eq!(stats.max_latency_ms(), None);

        stats.record_completed(Duration::from_millis(100), 10, 20);
        stats.record_completed(Duration::from_millis(200), 10, 20);

        assert_eq!(stats.avg_latency_ms(), 150.0);
        assert_eq!(stats.min_latency_ms(), Some(100.0));
        assert_eq!(stats.max_latency_ms(), Some(200.0));
    }

    #[test]
    fn test_stats_concurrent_access() {
        let stats = new_shared_stats();
        let mut handles = vec![];

        for i in 0..8 {
            let stats = stats.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let _guard = stats.enter();
                    stats.record_accepted(i % 2 == 0);
                    stats.record_completed(Duration::from_millis(5), 3, 7);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 800);
        assert_eq!(snapshot.active_requests, 0);
        assert_eq!(snapshot.streaming_requests, 400);
        assert_eq!(snapshot.prompt_tokens, 2400);
        assert_eq!(snapshot.completion_tokens, 5600);
    }

    #[test]
    fn test_snapshot_serialization() {
        let stats = Stats::new();
        stats.record_cancelled();
        let json = serde_json::to_string(&stats.snapshot()).unwrap();
        assert!(json.contains("\"cancelled_requests\":1"));
        assert!(json.contains("\"min_latency_ms\":null"));
    }
}
