//! Deletable membership filter (cuckoo) for liveness checks.
//!
//! Unlike the bloom filter, this structure supports true deletion, which
//! makes it the authoritative "is this record still live" check the engine
//! consults before trusting a positive hit from any other structure.
//!
//! Entries are 16-bit fingerprints stored in fixed-size buckets addressed by
//! two candidate locations (`i2 = i1 ^ hash(fp)`). Insertion may relocate
//! existing fingerprints between their candidate buckets; after a bounded
//! number of displacements it fails with `CapacityExceeded`, signaling the
//! engine to run an eviction pass before retrying.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Fingerprints per bucket.
const BUCKET_SIZE: usize = 4;

/// Empty slot marker. Fingerprints are always non-zero.
const EMPTY: u16 = 0;

/// Deletable membership filter with bounded-displacement insertion.
///
/// Duplicate keys are held as independent fingerprint copies, so each
/// `insert` is balanced by exactly one `remove`.
pub struct CuckooFilter {
    /// Bucket array. Length is a power of two.
    buckets: RwLock<Vec<[u16; BUCKET_SIZE]>>,
    /// Bucket index mask (`len - 1`).
    index_mask: usize,
    /// Maximum displacement attempts before reporting `CapacityExceeded`.
    max_kicks: usize,
    /// Number of fingerprints stored.
    count: AtomicUsize,
    /// PRNG state for victim slot selection during displacement.
    rng_state: AtomicU64,
}

impl CuckooFilter {
    /// Creates a filter sized for the given capacity.
    ///
    /// The bucket count is rounded up to the next power of two; effective
    /// slot capacity is `num_buckets * 4`.
    #[must_use]
    pub fn new(capacity: usize, max_kicks: usize) -> Self {
        let num_buckets = (capacity.max(1).div_ceil(BUCKET_SIZE)).next_power_of_two();

        Self {
            buckets: RwLock::new(vec![[EMPTY; BUCKET_SIZE]; num_buckets]),
            index_mask: num_buckets - 1,
            max_kicks,
            count: AtomicUsize::new(0),
            rng_state: AtomicU64::new(0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Adds a key to the filter.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if no placement is found within the
    /// displacement bound. The filter is left unchanged in that case.
    pub fn insert(&self, key: u64) -> Result<()> {
        let fp = fingerprint(key);
        let i1 = self.primary_index(key);
        let i2 = self.alt_index(i1, fp);

        let mut buckets = self.buckets.write();

        if Self::place_in_bucket(&mut buckets[i1], fp) || Self::place_in_bucket(&mut buckets[i2], fp)
        {
            self.count.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        // Both candidate buckets full: displace existing fingerprints.
        // Record each swap so a failed chain can be rolled back, leaving the
        // filter exactly as it was.
        let mut swaps: Vec<(usize, usize)> = Vec::with_capacity(self.max_kicks);
        let mut index = if self.next_random() & 1 == 0 { i1 } else { i2 };
        let mut hand = fp;

        for _ in 0..self.max_kicks {
            let slot = (self.next_random() as usize) % BUCKET_SIZE;
            std::mem::swap(&mut hand, &mut buckets[index][slot]);
            swaps.push((index, slot));

            index = self.alt_index(index, hand);
            if Self::place_in_bucket(&mut buckets[index], hand) {
                self.count.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }

        // Undo the displacement chain in reverse.
        for &(bucket, slot) in swaps.iter().rev() {
            std::mem::swap(&mut hand, &mut buckets[bucket][slot]);
        }

        Err(Error::CapacityExceeded(format!(
            "cuckoo filter: no placement after {} displacements ({} entries)",
            self.max_kicks,
            self.count.load(Ordering::Relaxed)
        )))
    }

    /// Removes one copy of a key.
    ///
    /// Returns false if the key was not present (detectable with high but
    /// not perfect confidence: a colliding fingerprint may be removed
    /// instead).
    pub fn remove(&self, key: u64) -> bool {
        let fp = fingerprint(key);
        let i1 = self.primary_index(key);
        let i2 = self.alt_index(i1, fp);

        let mut buckets = self.buckets.write();
        for index in [i1, i2] {
            if let Some(slot) = buckets[index].iter().position(|&s| s == fp) {
                buckets[index][slot] = EMPTY;
                self.count.fetch_sub(1, Ordering::Relaxed);
                return true;
            }
        }
        false
    }

    /// Returns true if the key might be in the filter.
    #[must_use]
    pub fn might_contain(&self, key: u64) -> bool {
        let fp = fingerprint(key);
        let i1 = self.primary_index(key);
        let i2 = self.alt_index(i1, fp);

        let buckets = self.buckets.read();
        buckets[i1].contains(&fp) || buckets[i2].contains(&fp)
    }

    /// Returns the number of stored fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns true if the filter holds no fingerprints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn place_in_bucket(bucket: &mut [u16; BUCKET_SIZE], fp: u16) -> bool {
        if let Some(slot) = bucket.iter().position(|&s| s == EMPTY) {
            bucket[slot] = fp;
            true
        } else {
            false
        }
    }

    fn primary_index(&self, key: u64) -> usize {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & self.index_mask
    }

    fn alt_index(&self, index: usize, fp: u16) -> usize {
        let mut hasher = FxHasher::default();
        fp.hash(&mut hasher);
        (index ^ hasher.finish() as usize) & self.index_mask
    }

    fn next_random(&self) -> u64 {
        // xorshift64
        let mut state = self.rng_state.load(Ordering::Relaxed);
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        self.rng_state.store(state, Ordering::Relaxed);
        state
    }
}

/// Derives a non-zero 16-bit fingerprint from a key.
fn fingerprint(key: u64) -> u16 {
    let mut hasher = FxHasher::default();
    0xF00Du16.hash(&mut hasher);
    key.hash(&mut hasher);
    let fp = (hasher.finish() >> 48) as u16;
    if fp == EMPTY {
        1
    } else {
        fp
    }
}
