//! Frequency sketch (count-min) for approximate access counting.
//!
//! A fixed `depth x width` grid of counters indexed by one seeded hash per
//! row. `estimate` takes the minimum across rows, so the error is one-sided:
//! the estimate is always >= the true count, and exceeds it by at most
//! `epsilon * total_increments` with probability `1 - delta`.
//!
//! `age()` halves every counter so recent activity dominates the estimate.
//! Aging is triggered by the engine's decay cycle, never self-scheduled.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

/// Count-min frequency sketch over u64 keys.
///
/// Counters are atomic, so `increment` and `estimate` run concurrently
/// without locks. Aging racing an increment may lose that single increment;
/// the one-sided bound holds for all counts observed between agings.
pub struct FrequencySketch {
    /// Flattened `depth x width` counter grid.
    counters: Vec<AtomicU32>,
    /// Counters per row.
    width: usize,
    /// Number of rows (independent hash functions).
    depth: usize,
}

impl FrequencySketch {
    /// Creates a sketch from error parameters.
    ///
    /// # Arguments
    ///
    /// * `epsilon` - Relative overcount bound; width = ceil(e / epsilon)
    /// * `delta` - Failure probability; depth = ceil(ln(1 / delta))
    #[must_use]
    pub fn new(epsilon: f64, delta: f64) -> Self {
        let width = (std::f64::consts::E / epsilon).ceil() as usize;
        let depth = (1.0 / delta).ln().ceil() as usize;
        Self::with_dimensions(width.max(1), depth.max(1))
    }

    /// Creates a sketch with explicit grid dimensions.
    #[must_use]
    pub fn with_dimensions(width: usize, depth: usize) -> Self {
        Self {
            counters: (0..width * depth).map(|_| AtomicU32::new(0)).collect(),
            width,
            depth,
        }
    }

    /// Records one observed access for a key.
    pub fn increment(&self, key: u64) {
        for row in 0..self.depth {
            let cell = self.cell_index(key, row);
            self.counters[cell].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns the approximate access count for a key.
    ///
    /// Never undercounts: the returned value is >= the number of
    /// `increment(key)` calls since the last aging.
    #[must_use]
    pub fn estimate(&self, key: u64) -> u32 {
        let mut min = u32::MAX;
        for row in 0..self.depth {
            let cell = self.cell_index(key, row);
            min = min.min(self.counters[cell].load(Ordering::Relaxed));
        }
        min
    }

    /// Halves every counter so older activity fades from the estimates.
    pub fn age(&self) {
        for counter in &self.counters {
            // Racy halving is fine: concurrent increments between load and
            // store may be lost, which only lowers the estimate toward truth.
            let current = counter.load(Ordering::Relaxed);
            if current > 0 {
                counter.store(current / 2, Ordering::Relaxed);
            }
        }
    }

    /// Returns the grid dimensions `(width, depth)`.
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.depth)
    }

    fn cell_index(&self, key: u64, row: usize) -> usize {
        let mut hasher = FxHasher::default();
        (row as u64).hash(&mut hasher);
        key.hash(&mut hasher);
        row * self.width + (hasher.finish() as usize) % self.width
    }
}
