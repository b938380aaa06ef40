//! Engine counters and query latency tracking.
//!
//! The core exposes exactly the counters it owns: record count, estimated
//! bloom false-positive rate, eviction and maintenance counts, and query
//! latency. Anything beyond that (exporters, dashboards) is an external
//! collaborator's concern.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Point-in-time snapshot of the engine's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Number of canonical records currently stored.
    pub size: usize,
    /// Estimated false-positive rate of the exact-membership filter.
    /// Drifts upward over the engine's lifetime since that filter is never
    /// compacted.
    pub estimated_fpr: f64,
    /// Total records removed by eviction passes.
    pub eviction_count: u64,
    /// Total decay passes completed.
    pub decay_passes: u64,
    /// Per-record removal failures swallowed during maintenance passes.
    pub maintenance_errors: u64,
    /// Average query latency over the recent sample window, microseconds.
    pub avg_query_latency_us: f64,
    /// 95th-percentile query latency over the recent sample window.
    pub p95_query_latency_us: f64,
}

/// Sliding-window latency recorder.
///
/// Keeps the most recent `window` samples; `average` and `percentile` are
/// computed over that window only, so long-gone slow queries stop skewing
/// the numbers.
pub struct LatencyRecorder {
    samples: RwLock<VecDeque<f64>>,
    window: usize,
}

impl LatencyRecorder {
    /// Creates a recorder keeping the most recent `window` samples.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            samples: RwLock::new(VecDeque::with_capacity(window)),
            window: window.max(1),
        }
    }

    /// Records one query latency in microseconds.
    pub fn record(&self, latency_us: f64) {
        let mut samples = self.samples.write();
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(latency_us);
    }

    /// Returns the mean latency over the window, 0 if no samples.
    #[must_use]
    pub fn average(&self) -> f64 {
        let samples = self.samples.read();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Returns the given percentile (0..=100) over the window, 0 if empty.
    #[must_use]
    pub fn percentile(&self, p: f64) -> f64 {
        let samples = self.samples.read();
        if samples.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f64> = samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let rank = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }

    /// Returns the number of samples currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    /// Returns true if no samples have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::new(1024)
    }
}
