//! Exact-membership filter (bloom) for O(1) "have we seen this key" checks.
//!
//! Space-efficient probabilistic structure used as the fast pre-check before
//! the engine falls through to more expensive structures. False negatives are
//! impossible: if `might_contain()` returns false, the key was never added.
//!
//! The filter is append-only for the engine's lifetime. Exceeding the sized
//! capacity degrades the false-positive rate gracefully rather than failing;
//! `estimated_fpr()` reports the current rate so callers can observe drift.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Append-only membership filter with a configurable false-positive rate.
///
/// The bit array is a vector of `AtomicU64` words, so inserts and probes run
/// concurrently without any exclusive lock.
pub struct BloomFilter {
    /// Bit array, packed into 64-bit atomic words.
    words: Vec<AtomicU64>,
    /// Number of bits (m).
    num_bits: usize,
    /// Number of hash functions (k).
    num_hashes: u32,
    /// Number of keys inserted.
    count: AtomicUsize,
}

impl BloomFilter {
    /// Creates a filter sized for the given capacity and target FPR.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Expected number of keys
    /// * `false_positive_rate` - Target FPR (e.g., 0.01 for 1%)
    #[must_use]
    pub fn new(capacity: usize, false_positive_rate: f64) -> Self {
        // m = -n * ln(p) / ln(2)^2, k = (m/n) * ln(2)
        let num_bits = Self::optimal_bits(capacity.max(1), false_positive_rate);
        let num_hashes = Self::optimal_hashes(num_bits, capacity.max(1));
        let num_words = num_bits.div_ceil(64);

        Self {
            words: (0..num_words).map(|_| AtomicU64::new(0)).collect(),
            num_bits,
            num_hashes,
            count: AtomicUsize::new(0),
        }
    }

    /// Marks a key as present.
    pub fn insert(&self, key: u64) {
        for i in 0..self.num_hashes {
            let (word, mask) = self.bit_position(key, i);
            self.words[word].fetch_or(mask, Ordering::Relaxed);
        }
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns true if the key was possibly added (false positives allowed),
    /// false only if it was definitely never added.
    #[must_use]
    pub fn might_contain(&self, key: u64) -> bool {
        for i in 0..self.num_hashes {
            let (word, mask) = self.bit_position(key, i);
            if self.words[word].load(Ordering::Relaxed) & mask == 0 {
                return false;
            }
        }
        true
    }

    /// Returns the number of keys inserted.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Estimates the current false-positive rate from the fill ratio.
    #[must_use]
    pub fn estimated_fpr(&self) -> f64 {
        let set_bits: usize = self
            .words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum();
        let fill_ratio = set_bits as f64 / self.num_bits as f64;
        fill_ratio.powi(self.num_hashes as i32)
    }

    fn bit_position(&self, key: u64, seed: u32) -> (usize, u64) {
        let mut hasher = FxHasher::default();
        seed.hash(&mut hasher);
        key.hash(&mut hasher);
        let bit_index = (hasher.finish() as usize) % self.num_bits;
        (bit_index / 64, 1u64 << (bit_index % 64))
    }

    fn optimal_bits(capacity: usize, fpr: f64) -> usize {
        let ln2_sq = std::f64::consts::LN_2 * std::f64::consts::LN_2;
        (-(capacity as f64) * fpr.ln() / ln2_sq).ceil() as usize
    }

    fn optimal_hashes(num_bits: usize, capacity: usize) -> u32 {
        let k = (num_bits as f64 / capacity as f64) * std::f64::consts::LN_2;
        (k.ceil() as u32).max(1)
    }
}

#[cfg(test)]
mod bloom_tests {
    use super::*;

    #[test]
    fn test_bloom_new() {
        let bloom = BloomFilter::new(1000, 0.01);
        assert_eq!(bloom.count(), 0);
        assert!(!bloom.might_contain(42));
    }

    #[test]
    fn test_bloom_insert_and_contains() {
        let bloom = BloomFilter::new(1000, 0.01);

        bloom.insert(42);

        assert!(bloom.might_contain(42));
        assert_eq!(bloom.count(), 1);
    }

    #[test]
    fn test_bloom_no_false_negatives() {
        let bloom = BloomFilter::new(10_000, 0.01);

        for key in 0..1000u64 {
            bloom.insert(key);
        }

        for key in 0..1000u64 {
            assert!(bloom.might_contain(key), "key {key} should be found");
        }
    }

    #[test]
    fn test_bloom_false_positive_rate_at_capacity() {
        let bloom = BloomFilter::new(10_000, 0.01);

        for key in 0..10_000u64 {
            bloom.insert(key);
        }

        let mut false_positives = 0usize;
        for key in 10_000..20_000u64 {
            if bloom.might_contain(key) {
                false_positives += 1;
            }
        }

        // Target 1%, allow statistical margin
        let fpr = false_positives as f64 / 10_000.0;
        assert!(fpr < 0.03, "FPR {fpr} should stay near the 1% target");
    }

    #[test]
    fn test_bloom_fpr_degrades_gracefully_past_capacity() {
        let bloom = BloomFilter::new(100, 0.01);

        // 10x over capacity: must not fail, FPR just rises
        for key in 0..1000u64 {
            bloom.insert(key);
        }
        for key in 0..1000u64 {
            assert!(bloom.might_contain(key));
        }
        assert!(bloom.estimated_fpr() > 0.01);
    }

    #[test]
    fn test_estimated_fpr_tracks_fill() {
        let bloom = BloomFilter::new(1000, 0.01);
        assert_eq!(bloom.estimated_fpr(), 0.0);

        for key in 0..1000u64 {
            bloom.insert(key);
        }
        let fpr = bloom.estimated_fpr();
        assert!(fpr > 0.0 && fpr < 0.05, "estimated FPR {fpr} out of range");
    }
}
