//! Control loop: routes queries and writes across the five structures.
//!
//! The orchestrator is the only component external callers interact with.
//! It exclusively owns canonical record storage; the filters, the sketch and
//! the similarity indexes hold only derived views (hashes, buckets, graph
//! edges), so every insertion and removal is centralized here. That keeps
//! the five independently-locked structures mutually consistent.
//!
//! # Insertion order
//!
//! `store` writes structures in a fixed order: canonical storage → bloom →
//! cuckoo → sketch → LSH → graph. A concurrent lookup racing a store may
//! miss a record still mid-insertion; records become *eventually visible*,
//! never partially corrupted. The cuckoo filter always precedes the graph,
//! so a graph-indexed record is guaranteed to be cuckoo-tracked.

mod maintenance;

pub use maintenance::MaintenanceHandle;

use crate::config::EngramConfig;
use crate::error::{Error, Result};
use crate::filter::{BloomFilter, CuckooFilter};
use crate::index::{LshIndex, NavGraph};
use crate::metrics::{LatencyRecorder, MetricsSnapshot};
use crate::record::{content_key, MemoryRecord, ScoredRecord, SearchResponse};
use crate::sketch::FrequencySketch;
use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Observable engine state, driven by requests and the maintenance timer.
///
/// Reads never block on a state change; the state exists for observability
/// and for the maintenance passes to announce themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    /// No write or maintenance activity in flight.
    Idle = 0,
    /// A store call is updating the structures.
    Ingesting = 1,
    /// A decay sweep is recomputing importance scores.
    Decaying = 2,
    /// An eviction pass is reclaiming capacity.
    Evicting = 3,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Ingesting,
            2 => Self::Decaying,
            3 => Self::Evicting,
            _ => Self::Idle,
        }
    }
}

/// The composite approximate-retrieval memory engine.
///
/// Stores content-bearing records produced by independent agents and answers
/// exact-membership, hotness and similarity queries against them, all safe
/// under concurrent invocation.
pub struct MemoryCore {
    config: EngramConfig,
    /// Canonical record storage. Sharded map: decay writes one record at a
    /// time under its shard lock, so lookups are never blocked for a whole
    /// sweep.
    records: DashMap<u64, MemoryRecord>,
    /// Content digest -> record ids, for exact lookups.
    by_content: RwLock<FxHashMap<u64, Vec<u64>>>,
    /// Exact-membership filter. Append-only for the engine's lifetime.
    bloom: BloomFilter,
    /// Deletable membership filter: the authoritative liveness check.
    cuckoo: CuckooFilter,
    /// Access frequency sketch, aged by the decay cycle.
    sketch: FrequencySketch,
    /// Coarse O(1) similarity index.
    lsh: LshIndex,
    /// High-recall O(log n) similarity index.
    graph: NavGraph,
    state: AtomicU8,
    eviction_count: AtomicU64,
    decay_passes: AtomicU64,
    maintenance_errors: AtomicU64,
    latency: LatencyRecorder,
    /// Set by `MaintenanceHandle::stop`; checked between records so decay
    /// and eviction passes abort promptly on shutdown.
    pub(crate) shutdown: AtomicBool,
}

impl MemoryCore {
    /// Creates an engine from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the configuration fails validation.
    pub fn new(config: EngramConfig) -> Result<Self> {
        config.validate()?;

        let capacity = config.engine.capacity;
        let cuckoo_slots = (capacity as f64 * config.filters.cuckoo_headroom).ceil() as usize;

        tracing::info!(
            dimension = config.engine.dimension,
            capacity,
            metric = ?config.engine.metric,
            "memory core initialized"
        );

        Ok(Self {
            records: DashMap::new(),
            by_content: RwLock::new(FxHashMap::default()),
            bloom: BloomFilter::new(capacity, config.filters.bloom_fpr),
            cuckoo: CuckooFilter::new(cuckoo_slots, config.filters.cuckoo_max_kicks),
            sketch: FrequencySketch::new(config.sketch.epsilon, config.sketch.delta),
            lsh: LshIndex::new(
                config.engine.dimension,
                config.lsh.tables,
                config.lsh.hyperplanes,
            ),
            graph: NavGraph::new(
                config.engine.metric,
                config.graph.max_connections,
                config.graph.ef_construction,
                capacity,
            ),
            state: AtomicU8::new(EngineState::Idle as u8),
            eviction_count: AtomicU64::new(0),
            decay_passes: AtomicU64::new(0),
            maintenance_errors: AtomicU64::new(0),
            latency: LatencyRecorder::default(),
            shutdown: AtomicBool::new(false),
            config,
        })
    }

    /// Creates an engine with the default configuration, overriding only the
    /// embedding dimension.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the dimension is out of range.
    pub fn with_dimension(dimension: usize) -> Result<Self> {
        let mut config = EngramConfig::default();
        config.engine.dimension = dimension;
        Self::new(config)
    }

    /// Returns the current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Returns the number of canonical records stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngramConfig {
        &self.config
    }

    /// Stores a record.
    ///
    /// Validates before any structural mutation, then writes the structures
    /// in the fixed insertion order. On cuckoo `CapacityExceeded`, runs one
    /// synchronous eviction pass and retries once; a second failure is fatal
    /// to this call and leaves no partial state behind.
    ///
    /// # Errors
    ///
    /// - `InvalidDimension` if the embedding length is wrong
    /// - `DuplicateId` if the id is already in use
    /// - `CapacityExceeded` if the deletable filter stays full after the
    ///   eviction retry
    pub fn store(&self, mut record: MemoryRecord) -> Result<u64> {
        if record.embedding.len() != self.config.engine.dimension {
            return Err(Error::InvalidDimension {
                expected: self.config.engine.dimension,
                actual: record.embedding.len(),
            });
        }

        let id = record.id;
        let key = record.content_key();
        let embedding = record.embedding.clone();

        let now = Self::now_secs();
        record.created_at = now;
        record.last_accessed_at = now;
        record.importance = record.importance.clamp(0.0, 1.0);

        self.set_state(EngineState::Ingesting);
        let result = self.store_inner(id, key, record, embedding);
        self.set_state(EngineState::Idle);
        result
    }

    fn store_inner(
        &self,
        id: u64,
        key: u64,
        record: MemoryRecord,
        embedding: Vec<f32>,
    ) -> Result<u64> {
        // Canonical storage first; entry insertion doubles as the atomic
        // duplicate-id check.
        match self.records.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Err(Error::DuplicateId(id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
        self.by_content.write().entry(key).or_default().push(id);

        self.bloom.insert(key);

        if let Err(err) = self.cuckoo.insert(key) {
            tracing::warn!(id, error = %err, "deletable filter full, running eviction pass");
            // The in-flight record is protected: it is already canonical,
            // typically with the lowest importance, and evicting it would
            // free no filter slot.
            self.eviction_pass(true, Some(id));

            if let Err(err) = self.cuckoo.insert(key) {
                // Fatal: roll canonical storage back. The bloom bit stays
                // set (append-only), which only costs a confirmed-negative
                // lookup later.
                self.records.remove(&id);
                self.unindex_content(key, id);
                return Err(err);
            }
        }

        self.sketch.increment(key);
        self.lsh.insert(id, &embedding);
        self.graph.insert(id, embedding.clone());

        // A maintenance pass racing this store may have claimed the record
        // after the canonical insert. Whoever removed the canonical entry
        // also cleaned the derived structures, so undoing our own index
        // entries leaves nothing behind.
        if !self.records.contains_key(&id) {
            self.lsh.remove(id, &embedding);
            self.graph.remove(id);
            return Err(Error::CapacityExceeded(format!(
                "record {id} was evicted while being stored"
            )));
        }

        tracing::debug!(id, key, "record stored");
        Ok(id)
    }

    /// Looks up a record by exact content.
    ///
    /// A negative from the append-only filter is trusted immediately (it
    /// admits no false negatives); a possible-positive is confirmed against
    /// the deletable filter and canonical storage before reporting a hit.
    /// Only records visible to `agent` (own or shared) are returned.
    ///
    /// A hit refreshes `last_accessed_at`, increments the frequency sketch
    /// and applies access reinforcement.
    pub fn lookup_exact(&self, agent: &str, content: &str) -> Result<Option<MemoryRecord>> {
        let started = Instant::now();
        let key = content_key(content);

        if !self.bloom.might_contain(key) || !self.cuckoo.might_contain(key) {
            self.observe_latency(started);
            return Ok(None);
        }

        let ids = self
            .by_content
            .read()
            .get(&key)
            .cloned()
            .unwrap_or_default();

        let mut found = None;
        for id in ids {
            // Content equality is checked before any read side effect, so a
            // digest collision never reinforces the colliding record.
            if let Some(record) = self.touch_matching(id, agent, |r| r.content == content) {
                found = Some(record);
                break;
            }
        }

        self.observe_latency(started);
        Ok(found)
    }

    /// Looks up the k most similar records to an embedding.
    ///
    /// `min_recall` selects the path: below the configured threshold, the
    /// LSH bucket index supplies candidates that are re-ranked by exact
    /// distance (O(1), lower recall); at or above it, the proximity graph is
    /// searched directly (O(log n), high recall). The graph bounds its work
    /// by the configured visit budget; exhausting it yields a partial
    /// result, not an error.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDimension` if the query embedding length is wrong.
    pub fn lookup_similar(
        &self,
        agent: &str,
        embedding: &[f32],
        k: usize,
        min_recall: f32,
    ) -> Result<SearchResponse> {
        if embedding.len() != self.config.engine.dimension {
            return Err(Error::InvalidDimension {
                expected: self.config.engine.dimension,
                actual: embedding.len(),
            });
        }

        let started = Instant::now();
        let (ranked, partial) = if min_recall < self.config.engine.recall_threshold {
            (self.lsh_ranked(embedding), false)
        } else {
            let hits = self.graph.search(
                embedding,
                // Over-fetch: visibility filtering below may drop hits
                k.saturating_mul(2).max(k + 4),
                self.config.graph.ef_search,
                self.config.graph.visit_budget,
            );
            (hits.hits, hits.partial)
        };

        let mut results = Vec::with_capacity(k);
        for (id, distance) in ranked {
            if results.len() >= k {
                break;
            }
            if let Some(record) = self.touch_visible(id, agent) {
                results.push(ScoredRecord::new(record, distance));
            }
        }

        self.observe_latency(started);
        Ok(SearchResponse { results, partial })
    }

    /// Marks a record as a breakthrough: maximum importance, shared with all
    /// agents. This is the only write path that bypasses decay.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRecord` if the id does not exist.
    pub fn mark_breakthrough(&self, id: u64) -> Result<()> {
        let Some(mut record) = self.records.get_mut(&id) else {
            return Err(Error::UnknownRecord(id));
        };

        record.importance = 1.0;
        record.shared = true;
        record.breakthrough = true;
        tracing::info!(id, agent = %record.agent, "record marked as breakthrough");
        Ok(())
    }

    /// Removes a record from canonical storage and every structure that
    /// indexes it. The append-only exact-membership filter is never cleaned;
    /// its false-positive rate is allowed to drift upward slowly.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRecord` if the id does not exist.
    pub fn forget(&self, id: u64) -> Result<()> {
        self.remove_record(id)?;
        tracing::debug!(id, "record forgotten");
        Ok(())
    }

    /// Returns a snapshot of the engine's counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            size: self.records.len(),
            estimated_fpr: self.bloom.estimated_fpr(),
            eviction_count: self.eviction_count.load(Ordering::Relaxed),
            decay_passes: self.decay_passes.load(Ordering::Relaxed),
            maintenance_errors: self.maintenance_errors.load(Ordering::Relaxed),
            avg_query_latency_us: self.latency.average(),
            p95_query_latency_us: self.latency.percentile(95.0),
        }
    }

    /// Returns the approximate access count for a content string.
    #[must_use]
    pub fn hotness(&self, content: &str) -> u32 {
        self.sketch.estimate(content_key(content))
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    pub(crate) fn set_state(&self, state: EngineState) {
        let previous = self.state.swap(state as u8, Ordering::Relaxed);
        if previous != state as u8 {
            tracing::trace!(from = ?EngineState::from_u8(previous), to = ?state, "state transition");
        }
    }

    pub(crate) fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn observe_latency(&self, started: Instant) {
        self.latency.record(started.elapsed().as_secs_f64() * 1e6);
    }

    /// Confirms a positive hit against the deletable filter and canonical
    /// storage, checks agent visibility, and applies the read side effects
    /// (timestamp refresh, sketch increment, reinforcement). Returns a
    /// clone of the record on success.
    fn touch_visible(&self, id: u64, agent: &str) -> Option<MemoryRecord> {
        self.touch_matching(id, agent, |_| true)
    }

    /// `touch_visible` with an extra match predicate, evaluated before any
    /// side effect. A record that fails the predicate is left untouched.
    fn touch_matching(
        &self,
        id: u64,
        agent: &str,
        matches: impl FnOnce(&MemoryRecord) -> bool,
    ) -> Option<MemoryRecord> {
        let mut record = self.records.get_mut(&id)?;
        if !record.visible_to(agent) || !matches(&*record) {
            return None;
        }

        let key = record.content_key();
        // The deletable filter is authoritative for liveness; a record that
        // lost its cuckoo entry is treated as already dead.
        if !self.cuckoo.might_contain(key) {
            return None;
        }

        record.last_accessed_at = Self::now_secs();
        self.sketch.increment(key);
        self.reinforce(&mut record, key);

        Some(record.clone())
    }

    /// Access reinforcement: importance rises with observed hotness and the
    /// record is promoted to shared once it crosses the threshold. A single
    /// atomic flag flip widens visibility; records are never copied between
    /// per-agent stores.
    fn reinforce(&self, record: &mut MemoryRecord, key: u64) {
        let saturation = self.config.sketch.hotness_saturation.max(1);
        let hotness = (self.sketch.estimate(key) as f32 / saturation as f32).min(1.0);

        if hotness > record.importance {
            record.importance = hotness;
        }
        if !record.shared && record.importance >= self.config.engine.promotion_threshold {
            record.shared = true;
            tracing::debug!(id = record.id, importance = record.importance, "record promoted to shared");
        }
    }

    /// LSH path: O(1) candidate retrieval, exact-distance re-rank over the
    /// candidate set only.
    fn lsh_ranked(&self, embedding: &[f32]) -> Vec<(u64, f32)> {
        let metric = self.config.engine.metric;
        let mut ranked: Vec<(u64, f32)> = self
            .lsh
            .candidates(embedding)
            .into_iter()
            .filter_map(|id| {
                self.records
                    .get(&id)
                    .map(|record| (id, metric.distance(embedding, &record.embedding)))
            })
            .collect();

        metric.sort_results(&mut ranked);
        ranked
    }

    /// Removes a record from canonical storage and all derived structures.
    pub(crate) fn remove_record(&self, id: u64) -> Result<()> {
        let Some((_, record)) = self.records.remove(&id) else {
            return Err(Error::UnknownRecord(id));
        };

        let key = record.content_key();
        self.unindex_content(key, id);
        self.cuckoo.remove(key);
        self.lsh.remove(id, &record.embedding);
        self.graph.remove(id);

        Ok(())
    }

    fn unindex_content(&self, key: u64, id: u64) {
        let mut by_content = self.by_content.write();
        if let Some(ids) = by_content.get_mut(&key) {
            ids.retain(|&entry| entry != id);
            if ids.is_empty() {
                by_content.remove(&key);
            }
        }
    }
}
