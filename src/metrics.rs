//! # Engine Metrics
//!
//! Tracks commit latency as a bounded sliding window (so percentiles favor
//! recent behavior over the lifetime of a long-running process) alongside
//! monotone object/byte counters.

use crate::types::EngineMetrics;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Number of recent commit-latency samples retained for percentile
/// computation.
const WINDOW_CAPACITY: usize = 1024;

pub struct Metrics {
    window: Mutex<VecDeque<u64>>,
    new_objects: AtomicU64,
    new_bytes: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(WINDOW_CAPACITY)),
            new_objects: AtomicU64::new(0),
            new_bytes: AtomicU64::new(0),
        }
    }

    /// Records one commit's latency and the new objects/bytes it
    /// introduced to the store. `new_objects`/`new_bytes` accumulate for
    /// the engine's full lifetime; latency feeds a bounded sliding window.
    pub fn record_commit(&self, latency: Duration, new_objects: u64, new_bytes: u64) {
        let micros = latency.as_micros().min(u64::MAX as u128) as u64;
        {
            let mut window = self.window.lock().unwrap();
            if window.len() == WINDOW_CAPACITY {
                window.pop_front();
            }
            window.push_back(micros);
        }
        self.new_objects.fetch_add(new_objects, Ordering::Relaxed);
        self.new_bytes.fetch_add(new_bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineMetrics {
        let mut samples: Vec<u64> = self.window.lock().unwrap().iter().copied().collect();
        samples.sort_unstable();

        let percentile = |p: f64| -> u64 {
            if samples.is_empty() {
                return 0;
            }
            let idx = (((samples.len() - 1) as f64) * p).round() as usize;
            samples[idx.min(samples.len() - 1)]
        };

        EngineMetrics {
            commit_latency_us_p50: percentile(0.50),
            commit_latency_us_p95: percentile(0.95),
            commit_latency_us_p99: percentile(0.99),
            new_objects: self.new_objects.load(Ordering::Relaxed),
            new_bytes: self.new_bytes.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_monotonically() {
        let m = Metrics::new();
        m.record_commit(Duration::from_micros(100), 3, 300);
        m.record_commit(Duration::from_micros(200), 2, 200);
        let snap = m.snapshot();
        assert_eq!(snap.new_objects, 5);
        assert_eq!(snap.new_bytes, 500);
    }

    #[test]
    fn percentiles_reflect_recorded_latencies() {
        let m = Metrics::new();
        for i in 1..=100u64 {
            m.record_commit(Duration::from_micros(i), 0, 0);
        }
        let snap = m.snapshot();
        assert!(snap.commit_latency_us_p50 >= 49 && snap.commit_latency_us_p50 <= 51);
        assert!(snap.commit_latency_us_p99 >= 98);
        assert!(snap.commit_latency_us_p95 <= snap.commit_latency_us_p99);
    }

    #[test]
    fn empty_window_reports_zero_percentiles() {
        let m = Metrics::new();
        let snap = m.snapshot();
        assert_eq!(snap.commit_latency_us_p50, 0);
        assert_eq!(snap.commit_latency_us_p99, 0);
    }

    #[test]
    fn window_is_bounded() {
        let m = Metrics::new();
        for i in 0..(WINDOW_CAPACITY * 2) as u64 {
            m.record_commit(Duration::from_micros(i), 0, 0);
        }
        assert_eq!(m.window.lock().unwrap().len(), WINDOW_CAPACITY);
    }
}
