//! Processing statistics: processed/failed/retried counters plus a moving
//! average over the last 1000 durations, grounded on the teacher's
//! `RunMetrics` atomic-counter pattern and widened with a bounded window for
//! the moving average `spec.md` §4.4 calls for (the teacher's own metric is a
//! cumulative, not sliding, average).

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::Mutex;

const WINDOW_SIZE: usize = 1000;

pub struct ProcessorStats {
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    cumulative_duration_ms: AtomicU64,
    window: Mutex<VecDeque<u64>>,
}

impl ProcessorStats {
    pub fn new() -> Self {
        Self {
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            cumulative_duration_ms: AtomicU64::new(0),
            window: Mutex::new(VecDeque::with_capacity(WINDOW_SIZE)),
        }
    }

    pub fn record(&self, duration_ms: u64, success: bool, retry_count: u32) {
        if success {
            self.processed.fetch_add(1, Relaxed);
        } else {
            self.failed.fetch_add(1, Relaxed);
        }
        if retry_count > 0 {
            self.retried.fetch_add(1, Relaxed);
        }
        self.cumulative_duration_ms.fetch_add(duration_ms, Relaxed);

        let mut window = self.window.lock().unwrap();
        if window.len() >= WINDOW_SIZE {
            window.pop_front();
        }
        window.push_back(duration_ms);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let window = self.window.lock().unwrap();
        let moving_average_latency_ms = if window.is_empty() {
            0
        } else {
            window.iter().sum::<u64>() / window.len() as u64
        };
        StatsSnapshot {
            processed: self.processed.load(Relaxed),
            failed: self.failed.load(Relaxed),
            retried: self.retried.load(Relaxed),
            cumulative_processing_time_ms: self.cumulative_duration_ms.load(Relaxed),
            moving_average_latency_ms,
        }
    }
}

impl Default for ProcessorStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub processed: u64,
    pub failed: u64,
    pub retried: u64,
    pub cumulative_processing_time_ms: u64,
    pub moving_average_latency_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_processed_and_failed_separately() {
        let stats = ProcessorStats::new();
        stats.record(10, true, 0);
        stats.record(20, false, 0);
        let snap = stats.snapshot();
        assert_eq!(snap.processed, 1);
        assert_eq!(snap.failed, 1);
    }

    #[test]
    fn retried_counts_only_positive_retry_counts() {
        let stats = ProcessorStats::new();
        stats.record(10, true, 0);
        stats.record(10, true, 2);
        let snap = stats.snapshot();
        assert_eq!(snap.retried, 1);
    }

    #[test]
    fn moving_average_reflects_window() {
        let stats = ProcessorStats::new();
        stats.record(10, true, 0);
        stats.record(20, true, 0);
        stats.record(30, true, 0);
        let snap = stats.snapshot();
        assert_eq!(snap.moving_average_latency_ms, 20);
    }

    #[test]
    fn window_is_bounded_to_last_1000() {
        let stats = ProcessorStats::new();
        for _ in 0..1000 {
            stats.record(10, true, 0);
        }
        stats.record(2000, true, 0);
        let snap = stats.snapshot();
        // 999 * 10 + 2000 = 11990, / 1000 = 11 (integer division)
        assert_eq!(snap.moving_average_latency_ms, 11);
    }
}
