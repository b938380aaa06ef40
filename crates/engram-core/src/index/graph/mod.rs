//! Proximity graph index: multi-layer navigable graph for high-recall
//! approximate nearest-neighbor search.
//!
//! Structure follows the Malkov & Yashunin construction: every node links to
//! a bounded number of near neighbors at its layer, higher layers are sparser
//! express lanes, and both insertion and search greedily descend from a
//! top-layer entry point. Degree is capped (`M`, `2M` at layer 0) by pruning
//! the weakest edge on overflow, which bounds search cost at O(log n).
//!
//! Two departures from the textbook structure, both required by the engine:
//! node removal (eviction and forget must be able to unlink a record) and a
//! visit budget on search (exhausting it returns the best candidates found
//! so far, flagged partial).

mod layer;
mod mappings;
mod ordered_float;

pub use layer::NodeId;
pub use mappings::GraphMappings;

use crate::distance::DistanceMetric;
use layer::Layer;
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Result of a graph search: ranked hits plus a partial-result marker.
#[derive(Debug, Clone)]
pub struct GraphHits {
    /// `(record id, distance)` pairs, distance ascending.
    pub hits: Vec<(u64, f32)>,
    /// True if the visit budget ran out before the search converged.
    pub partial: bool,
}

/// Navigable proximity graph over record embeddings.
pub struct NavGraph {
    /// Shared distance primitive (same metric as the bucket index).
    metric: DistanceMetric,
    /// Node embeddings, indexed by internal node id.
    vectors: RwLock<Vec<Vec<f32>>>,
    /// Top layer of each node.
    node_levels: RwLock<Vec<usize>>,
    /// Hierarchical layers (layer 0 = bottom, dense connections).
    layers: RwLock<Vec<Layer>>,
    /// Entry point for search (a node on the highest layer).
    entry_point: RwLock<Option<NodeId>>,
    /// Layer of the entry point.
    max_layer: AtomicUsize,
    /// Record id <-> node id translation, tracks liveness.
    mappings: RwLock<GraphMappings>,
    /// PRNG state for random layer assignment.
    rng_state: AtomicU64,
    /// Maximum connections per node above layer 0 (M).
    max_connections: usize,
    /// Maximum connections at layer 0 (2M).
    max_connections_0: usize,
    /// Candidate pool size during construction.
    ef_construction: usize,
    /// Level multiplier for layer assignment (1/ln(M)).
    level_mult: f64,
}

impl NavGraph {
    /// Creates an empty graph.
    ///
    /// # Arguments
    ///
    /// * `metric` - Distance primitive shared with the bucket index
    /// * `max_connections` - M parameter (degree bound above layer 0)
    /// * `ef_construction` - Construction-time candidate pool size
    /// * `capacity_hint` - Expected node count, used for pre-allocation
    #[must_use]
    pub fn new(
        metric: DistanceMetric,
        max_connections: usize,
        ef_construction: usize,
        capacity_hint: usize,
    ) -> Self {
        Self {
            metric,
            vectors: RwLock::new(Vec::with_capacity(capacity_hint)),
            node_levels: RwLock::new(Vec::with_capacity(capacity_hint)),
            layers: RwLock::new(vec![Layer::new(capacity_hint)]),
            entry_point: RwLock::new(None),
            max_layer: AtomicUsize::new(0),
            mappings: RwLock::new(GraphMappings::default()),
            rng_state: AtomicU64::new(0x5DEE_CE66_D1A4_B5B5),
            max_connections,
            max_connections_0: max_connections * 2,
            ef_construction,
            level_mult: 1.0 / (max_connections as f64).ln(),
        }
    }

    /// Returns the number of live (not removed) nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.read().len()
    }

    /// Returns true if the graph holds no live nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.read().is_empty()
    }

    /// Returns true if a record id is indexed.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.mappings.read().node(id).is_some()
    }

    /// Inserts a record embedding into the graph.
    ///
    /// The engine guarantees id uniqueness before calling; a duplicate id is
    /// ignored here.
    pub fn insert(&self, id: u64, vector: Vec<f32>) {
        let node_level = self.random_level();

        // Allocate the node id and its per-node metadata together.
        let node = {
            let mut vectors = self.vectors.write();
            let mut levels = self.node_levels.write();
            let node = vectors.len();
            vectors.push(vector);
            levels.push(node_level);
            node
        };

        if !self.mappings.write().register(id, node) {
            return;
        }

        {
            let mut layers = self.layers.write();
            while layers.len() <= node_level {
                layers.push(Layer::new(node + 1));
            }
            for layer in layers.iter_mut() {
                layer.ensure_capacity(node);
            }
        }

        // Claim-or-observe under one write lock: two inserts racing on an
        // empty graph must not both believe they are the first node, or the
        // loser would end up unlinked and invisible to search.
        let entry_point = {
            let mut ep = self.entry_point.write();
            if ep.is_none() {
                *ep = Some(node);
            }
            ep.filter(|&existing| existing != node)
        };

        if let Some(ep) = entry_point {
            let query = self.get_vector(node);
            let mut current_ep = ep;
            let max_layer = self.max_layer.load(Ordering::Relaxed);

            // Greedy descent through the express lanes above the node's layer
            for layer_idx in (node_level + 1..=max_layer).rev() {
                current_ep = self.greedy_closest(&query, current_ep, layer_idx);
            }

            // Connect on every layer from the node's layer down to 0
            for layer_idx in (0..=node_level.min(max_layer)).rev() {
                let (neighbors, _) = self.search_layer(
                    &query,
                    vec![current_ep],
                    self.ef_construction,
                    layer_idx,
                    usize::MAX,
                );

                let max_conn = self.degree_bound(layer_idx);
                let selected: Vec<NodeId> = neighbors
                    .iter()
                    .take(max_conn)
                    .map(|&(n, _)| n)
                    .collect();

                self.layers.read()[layer_idx].set_neighbors(node, selected.clone());

                for &neighbor in &selected {
                    self.link_back(node, neighbor, layer_idx, max_conn);
                }

                if let Some(&(closest, _)) = neighbors.first() {
                    current_ep = closest;
                }
            }
        }

        // A node above the current top layer becomes the new entry point
        if node_level > self.max_layer.load(Ordering::Relaxed) {
            self.max_layer.store(node_level, Ordering::Relaxed);
            *self.entry_point.write() = Some(node);
        }
    }

    /// Searches for the k approximate nearest neighbors.
    ///
    /// # Arguments
    ///
    /// * `query` - Query embedding
    /// * `k` - Number of neighbors to return
    /// * `ef_search` - Candidate pool size at layer 0
    /// * `visit_budget` - Maximum nodes visited at layer 0 before returning
    ///   the best candidates found so far (partial result)
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize, ef_search: usize, visit_budget: usize) -> GraphHits {
        let entry_point = *self.entry_point.read();
        let Some(ep) = entry_point else {
            return GraphHits {
                hits: Vec::new(),
                partial: false,
            };
        };

        let max_layer = self.max_layer.load(Ordering::Relaxed);
        let mut current_ep = ep;
        for layer_idx in (1..=max_layer).rev() {
            current_ep = self.greedy_closest(query, current_ep, layer_idx);
        }

        let (candidates, partial) =
            self.search_layer(query, vec![current_ep], ef_search.max(k), 0, visit_budget);

        // Translate nodes to record ids, dropping anything removed mid-search
        let mappings = self.mappings.read();
        let hits = candidates
            .into_iter()
            .filter_map(|(node, dist)| mappings.id(node).map(|id| (id, dist)))
            .take(k)
            .collect();

        GraphHits { hits, partial }
    }

    /// Removes a record from the graph.
    ///
    /// Unlinks the node from every neighbor on every layer, clears its own
    /// adjacency, drops its id mapping, and repairs the entry point if the
    /// removed node was serving as one. Returns false if the id was not
    /// indexed.
    pub fn remove(&self, id: u64) -> bool {
        let Some(node) = self.mappings.write().remove(id) else {
            return false;
        };

        let node_level = self.node_levels.read().get(node).copied().unwrap_or(0);

        {
            let layers = self.layers.read();
            for layer_idx in 0..=node_level.min(layers.len().saturating_sub(1)) {
                let layer = &layers[layer_idx];
                for neighbor in layer.get_neighbors(node) {
                    layer.unlink(neighbor, node);
                }
                layer.clear_node(node);
            }
        }

        // The vector slot stays allocated as a tombstone; adjacency and the
        // id mapping are what make a node reachable.
        if *self.entry_point.read() == Some(node) {
            self.repair_entry_point();
        }

        true
    }

    // =========================================================================
    // Private helpers
    // =========================================================================

    fn degree_bound(&self, layer_idx: usize) -> usize {
        if layer_idx == 0 {
            self.max_connections_0
        } else {
            self.max_connections
        }
    }

    fn get_vector(&self, node: NodeId) -> Vec<f32> {
        self.vectors.read()[node].clone()
    }

    fn random_level(&self) -> usize {
        // xorshift64 + exponential distribution, capped at 16 layers
        let mut state = self.rng_state.load(Ordering::Relaxed);
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        self.rng_state.store(state, Ordering::Relaxed);

        let uniform = (state as f64) / (u64::MAX as f64);
        let level = (-uniform.ln() * self.level_mult).floor() as usize;
        level.min(15)
    }

    /// Greedy single-step descent: walks to the closest neighbor until no
    /// neighbor improves on the current node.
    fn greedy_closest(&self, query: &[f32], entry: NodeId, layer_idx: usize) -> NodeId {
        let vectors = self.vectors.read();
        let mut best = entry;
        let mut best_dist = self.metric.distance(query, &vectors[best]);

        loop {
            let neighbors = self.layers.read()[layer_idx].get_neighbors(best);
            let mut improved = false;

            for neighbor in neighbors {
                let dist = self.metric.distance(query, &vectors[neighbor]);
                if dist < best_dist {
                    best = neighbor;
                    best_dist = dist;
                    improved = true;
                }
            }

            if !improved {
                return best;
            }
        }
    }

    /// Best-first search within one layer, bounded by `ef` candidates and a
    /// visit budget. Returns `(sorted candidates, budget_exhausted)`.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: Vec<NodeId>,
        ef: usize,
        layer_idx: usize,
        visit_budget: usize,
    ) -> (Vec<(NodeId, f32)>, bool) {
        use std::cmp::Reverse;

        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut candidates: BinaryHeap<Reverse<(OrderedFloat, NodeId)>> = BinaryHeap::new();
        let mut results: BinaryHeap<(OrderedFloat, NodeId)> = BinaryHeap::new();
        let mut budget_exhausted = false;

        // Single vectors lock acquisition for the whole search
        let vectors = self.vectors.read();

        for ep in entry_points {
            let dist = self.metric.distance(query, &vectors[ep]);
            candidates.push(Reverse((OrderedFloat(dist), ep)));
            results.push((OrderedFloat(dist), ep));
            visited.insert(ep);
        }

        while let Some(Reverse((OrderedFloat(c_dist), c_node))) = candidates.pop() {
            let furthest = results.peek().map_or(f32::MAX, |r| r.0 .0);
            if c_dist > furthest && results.len() >= ef {
                break;
            }

            if visited.len() >= visit_budget {
                budget_exhausted = true;
                break;
            }

            let neighbors = self.layers.read()[layer_idx].get_neighbors(c_node);
            for neighbor in neighbors {
                if visited.insert(neighbor) {
                    let dist = self.metric.distance(query, &vectors[neighbor]);
                    let furthest = results.peek().map_or(f32::MAX, |r| r.0 .0);

                    if dist < furthest || results.len() < ef {
                        candidates.push(Reverse((OrderedFloat(dist), neighbor)));
                        results.push((OrderedFloat(dist), neighbor));

                        if results.len() > ef {
                            results.pop();
                        }
                    }
                }
            }
        }

        let mut sorted: Vec<(NodeId, f32)> = results.into_iter().map(|(d, n)| (n, d.0)).collect();
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
        (sorted, budget_exhausted)
    }

    /// Links `node` back from `neighbor`, pruning the weakest edge when the
    /// neighbor's degree bound overflows.
    ///
    /// Vectors are pre-fetched before the layers lock is touched so the two
    /// locks are never held together.
    fn link_back(&self, node: NodeId, neighbor: NodeId, layer_idx: usize, max_conn: usize) {
        let current = self.layers.read()[layer_idx].get_neighbors(neighbor);

        if current.len() < max_conn {
            let layers = self.layers.read();
            let mut neighbors = layers[layer_idx].get_neighbors(neighbor);
            if !neighbors.contains(&node) {
                neighbors.push(node);
                layers[layer_idx].set_neighbors(neighbor, neighbors);
            }
            return;
        }

        // Degree overflow: keep the max_conn closest, dropping the weakest
        let neighbor_vec = self.get_vector(neighbor);
        let mut extended = current;
        extended.push(node);

        let mut with_dist: Vec<(NodeId, f32)> = {
            let vectors = self.vectors.read();
            extended
                .iter()
                .map(|&n| (n, self.metric.distance(&neighbor_vec, &vectors[n])))
                .collect()
        };

        with_dist.sort_by(|a, b| a.1.total_cmp(&b.1));
        let pruned: Vec<NodeId> = with_dist.into_iter().take(max_conn).map(|(n, _)| n).collect();

        self.layers.read()[layer_idx].set_neighbors(neighbor, pruned);
    }

    /// Picks a new entry point after the old one was removed: the live node
    /// with the highest layer, or none if the graph is empty.
    fn repair_entry_point(&self) {
        let mappings = self.mappings.read();
        let levels = self.node_levels.read();

        let replacement = mappings
            .live_nodes()
            .map(|node| (node, levels.get(node).copied().unwrap_or(0)))
            .max_by_key(|&(_, level)| level);

        match replacement {
            Some((node, level)) => {
                *self.entry_point.write() = Some(node);
                self.max_layer.store(level, Ordering::Relaxed);
            }
            None => {
                *self.entry_point.write() = None;
                self.max_layer.store(0, Ordering::Relaxed);
            }
        }
    }
}
