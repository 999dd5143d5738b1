//! In-process metric cells
//!
//! Cheap to clone; clones share the same cell.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

const DEFAULT_WINDOW: usize = 4096;

#[derive(Clone)]
struct Cell {
    name: Arc<str>,
    value: Arc<AtomicU64>,
}

impl Default for Cell {
    fn default() -> Self {
        Self::named("")
    }
}

impl Cell {
    fn named(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            value: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Monotonic count of events
#[derive(Clone, Default)]
pub struct Counter(Cell);

impl Counter {
    pub fn new(name: &str) -> Self {
        Self(Cell::named(name))
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

/// Level that moves both ways, floored at zero
#[derive(Clone, Default)]
pub struct Gauge(Cell);

impl Gauge {
    pub fn new(name: &str) -> Self {
        Self(Cell::named(name))
    }

    pub fn set(&self, value: u64) {
        self.0.value.store(value, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.0.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .0
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }

    pub fn get(&self) -> u64 {
        self.0.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

/// Sliding window of the most recent observations
#[derive(Clone)]
pub struct Histogram {
    name: Arc<str>,
    window: usize,
    samples: Arc<Mutex<VecDeque<f64>>>,
}

impl Histogram {
    pub fn new(name: &str) -> Self {
        Self::with_window(name, DEFAULT_WINDOW)
    }

    pub fn with_window(name: &str, window: usize) -> Self {
        let window = window.max(1);
        Self {
            name: Arc::from(name),
            window,
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(window))),
        }
    }

    /// Non-finite observations are ignored
    pub fn record(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let mut samples = self.samples.lock();
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(value);
    }

    pub fn count(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn mean(&self) -> f64 {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Nearest-rank percentile, `p` in `0..=100`
    pub fn percentile(&self, p: f64) -> f64 {
        let mut sorted: Vec<f64> = self.samples.lock().iter().copied().collect();
        if sorted.is_empty() {
            return 0.0;
        }
        sorted.sort_by(f64::total_cmp);
        let rank = ((sorted.len() as f64) * p.clamp(0.0, 100.0) / 100.0) as usize;
        sorted[rank.min(sorted.len() - 1)]
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_clones_share_state() {
        let failures = Counter::new("partition_failures");
        let handle = failures.clone();
        handle.inc();
        failures.add(2);
        assert_eq!(failures.get(), 3);
        assert_eq!(handle.name(), "partition_failures");
    }

    #[test]
    fn test_gauge_floors_at_zero() {
        let inflight = Gauge::new("inflight_partition_calls");
        inflight.dec();
        assert_eq!(inflight.get(), 0);
        inflight.inc();
        inflight.inc();
        inflight.dec();
        assert_eq!(inflight.get(), 1);
        inflight.set(7);
        assert_eq!(inflight.get(), 7);
    }

    #[test]
    fn test_histogram_window_and_percentiles() {
        let latency = Histogram::with_window("fanout_latency_ms", 4);
        for v in [100.0, 5.0, 1.0, 4.0, 2.0, f64::NAN] {
            latency.record(v);
        }
        // 100.0 fell out of the window, NaN was ignored
        assert_eq!(latency.count(), 4);
        assert!((latency.mean() - 3.0).abs() < 1e-9);
        assert_eq!(latency.percentile(0.0), 1.0);
        assert_eq!(latency.percentile(100.0), 5.0);
    }
}
