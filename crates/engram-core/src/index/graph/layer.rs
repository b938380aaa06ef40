//! A single layer in the navigable graph hierarchy.

use parking_lot::RwLock;

/// Internal identifier for a node in the graph.
pub type NodeId = usize;

/// One layer of adjacency lists. Layer 0 is the dense bottom layer; higher
/// layers are sparser express lanes.
#[derive(Debug)]
pub struct Layer {
    /// Adjacency list: `node_id -> neighbor node ids`. Per-node locks keep
    /// link updates from serializing unrelated nodes.
    neighbors: Vec<RwLock<Vec<NodeId>>>,
}

impl Layer {
    /// Creates a new layer with the given capacity.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            neighbors: (0..capacity).map(|_| RwLock::new(Vec::new())).collect(),
        }
    }

    /// Ensures the layer has a slot for `node_id`.
    pub(crate) fn ensure_capacity(&mut self, node_id: NodeId) {
        while self.neighbors.len() <= node_id {
            self.neighbors.push(RwLock::new(Vec::new()));
        }
    }

    /// Returns a copy of a node's neighbor list.
    pub(crate) fn get_neighbors(&self, node_id: NodeId) -> Vec<NodeId> {
        if node_id < self.neighbors.len() {
            self.neighbors[node_id].read().clone()
        } else {
            Vec::new()
        }
    }

    /// Replaces a node's neighbor list.
    pub(crate) fn set_neighbors(&self, node_id: NodeId, neighbors: Vec<NodeId>) {
        if node_id < self.neighbors.len() {
            *self.neighbors[node_id].write() = neighbors;
        }
    }

    /// Removes `target` from `node_id`'s neighbor list, if linked.
    pub(crate) fn unlink(&self, node_id: NodeId, target: NodeId) {
        if node_id < self.neighbors.len() {
            self.neighbors[node_id].write().retain(|&n| n != target);
        }
    }

    /// Drops all of a node's outgoing edges.
    pub(crate) fn clear_node(&self, node_id: NodeId) {
        if node_id < self.neighbors.len() {
            self.neighbors[node_id].write().clear();
        }
    }
}
