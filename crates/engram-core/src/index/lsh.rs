//! Locality-sensitive bucket index for O(1) coarse similarity lookup.
//!
//! Random-projection LSH: each table hashes an embedding to a signature made
//! of the sign bits of its dot products with that table's hyperplanes.
//! Candidate retrieval unions the bucket contents across tables, trading
//! recall for speed. The engine re-ranks candidates by exact distance, so
//! this index never needs to order anything itself.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Multi-table random-projection index over u64 record ids.
///
/// Hyperplanes are generated once at construction from a fixed xorshift
/// seed, so signatures are deterministic for the lifetime of the index.
pub struct LshIndex {
    /// One bucket map per table: signature -> ids.
    tables: Vec<RwLock<FxHashMap<u64, Vec<u64>>>>,
    /// Per-table projection hyperplanes, `planes_per_table x dimension`.
    hyperplanes: Vec<Vec<Vec<f32>>>,
    /// Embedding dimension.
    dimension: usize,
    /// Number of entries inserted (and not yet removed).
    count: AtomicUsize,
}

impl LshIndex {
    /// Creates an index with the given table count and signature width.
    ///
    /// # Arguments
    ///
    /// * `dimension` - Embedding dimension
    /// * `num_tables` - Independent hash tables (more tables, higher recall)
    /// * `planes_per_table` - Signature bits per table (more bits, smaller buckets)
    #[must_use]
    pub fn new(dimension: usize, num_tables: usize, planes_per_table: usize) -> Self {
        let mut rng_state = 0x51_7C_C1B7_2722_0A95u64;
        let mut next = move || {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;
            // Uniform in [-1, 1)
            (rng_state >> 11) as f32 / (1u64 << 53) as f32 * 2.0 - 1.0
        };

        let hyperplanes = (0..num_tables)
            .map(|_| {
                (0..planes_per_table)
                    .map(|_| (0..dimension).map(|_| next()).collect())
                    .collect()
            })
            .collect();

        Self {
            tables: (0..num_tables)
                .map(|_| RwLock::new(FxHashMap::default()))
                .collect(),
            hyperplanes,
            dimension,
            count: AtomicUsize::new(0),
        }
    }

    /// Inserts an id under its signature in every table.
    pub fn insert(&self, id: u64, embedding: &[f32]) {
        debug_assert_eq!(embedding.len(), self.dimension);

        for (table, planes) in self.tables.iter().zip(&self.hyperplanes) {
            let signature = Self::signature(planes, embedding);
            table.write().entry(signature).or_default().push(id);
        }
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes an id from every table.
    ///
    /// The embedding must match the one used at insertion, since it
    /// determines the bucket addresses.
    pub fn remove(&self, id: u64, embedding: &[f32]) {
        debug_assert_eq!(embedding.len(), self.dimension);

        let mut removed_any = false;
        for (table, planes) in self.tables.iter().zip(&self.hyperplanes) {
            let signature = Self::signature(planes, embedding);
            let mut buckets = table.write();
            if let Some(bucket) = buckets.get_mut(&signature) {
                let before = bucket.len();
                bucket.retain(|&entry| entry != id);
                removed_any |= bucket.len() < before;
                if bucket.is_empty() {
                    buckets.remove(&signature);
                }
            }
        }
        if removed_any {
            self.count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Returns the unordered candidate set for a query embedding.
    ///
    /// Unions the matching bucket of every table, deduplicated. Expected
    /// O(1) in the number of stored entries; recall depends on table count.
    #[must_use]
    pub fn candidates(&self, embedding: &[f32]) -> Vec<u64> {
        debug_assert_eq!(embedding.len(), self.dimension);

        let mut seen: FxHashSet<u64> = FxHashSet::default();
        let mut result = Vec::new();

        for (table, planes) in self.tables.iter().zip(&self.hyperplanes) {
            let signature = Self::signature(planes, embedding);
            if let Some(bucket) = table.read().get(&signature) {
                for &id in bucket {
                    if seen.insert(id) {
                        result.push(id);
                    }
                }
            }
        }

        result
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns true if the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn signature(planes: &[Vec<f32>], embedding: &[f32]) -> u64 {
        let mut signature = 0u64;
        for (bit, plane) in planes.iter().enumerate() {
            let dot: f32 = plane
                .iter()
                .zip(embedding.iter())
                .map(|(p, e)| p * e)
                .sum();
            if dot >= 0.0 {
                signature |= 1 << bit;
            }
        }
        signature
    }
}
