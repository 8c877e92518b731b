//! Rolling render-time statistics.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

/// Default number of render durations retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Aggregates over the retained render durations, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RenderStats {
    pub average_render_time: f64,
    pub min_render_time: f64,
    pub max_render_time: f64,
    pub frame_count: usize,
}

/// Keeps the most recent render durations in a bounded window.
pub struct PerformanceMonitor {
    samples: Mutex<VecDeque<Duration>>,
    capacity: usize,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl PerformanceMonitor {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record one render duration, discarding the oldest when full.
    pub fn record(&self, elapsed: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(elapsed);
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }

    /// Current aggregates. All zero when nothing has been recorded.
    pub fn stats(&self) -> RenderStats {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return RenderStats::default();
        }

        let secs = samples.iter().map(Duration::as_secs_f64);
        let total: f64 = secs.clone().sum();
        RenderStats {
            average_render_time: total / samples.len() as f64,
            min_render_time: secs.clone().fold(f64::INFINITY, f64::min),
            max_render_time: secs.fold(0.0, f64::max),
            frame_count: samples.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_empty_stats_are_zero() {
        let monitor = PerformanceMonitor::default();
        assert_eq!(monitor.stats(), RenderStats::default());
        assert_eq!(monitor.capacity(), 50);
    }

    #[test]
    fn test_aggregates() {
        let monitor = PerformanceMonitor::new(10);
        monitor.record(ms(10));
        monitor.record(ms(30));
        monitor.record(ms(20));

        let stats = monitor.stats();
        assert_eq!(stats.frame_count, 3);
        assert!((stats.average_render_time - 0.02).abs() < 1e-9);
        assert!((stats.min_render_time - 0.01).abs() < 1e-9);
        assert!((stats.max_render_time - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_window_drops_oldest() {
        let monitor = PerformanceMonitor::default();
        monitor.record(ms(500));
        for _ in 0..50 {
            monitor.record(ms(1));
        }
        let stats = monitor.stats();
        assert_eq!(stats.frame_count, 50);
        assert!((stats.max_render_time - 0.001).abs() < 1e-9);

        monitor.clear();
        assert!(monitor.is_empty());
    }
}
