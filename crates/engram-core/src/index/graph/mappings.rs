//! Bidirectional mapping between record ids (u64) and internal node ids.
//!
//! The graph allocates dense internal node ids for its adjacency arrays;
//! this table translates to and from the engine's record ids and remembers
//! which nodes are live after removals.

use super::layer::NodeId;
use rustc_hash::FxHashMap;

/// Record-id to node-id translation table.
#[derive(Debug, Default)]
pub struct GraphMappings {
    id_to_node: FxHashMap<u64, NodeId>,
    node_to_id: FxHashMap<NodeId, u64>,
}

impl GraphMappings {
    /// Registers a record id under an internal node id.
    /// Returns false if the record id is already registered.
    pub fn register(&mut self, id: u64, node: NodeId) -> bool {
        if self.id_to_node.contains_key(&id) {
            return false;
        }
        self.id_to_node.insert(id, node);
        self.node_to_id.insert(node, id);
        true
    }

    /// Removes a record id, returning its node id if it was registered.
    pub fn remove(&mut self, id: u64) -> Option<NodeId> {
        let node = self.id_to_node.remove(&id)?;
        self.node_to_id.remove(&node);
        Some(node)
    }

    /// Returns the node id for a record id.
    #[must_use]
    pub fn node(&self, id: u64) -> Option<NodeId> {
        self.id_to_node.get(&id).copied()
    }

    /// Returns the record id for a node id. `None` means the node was
    /// removed and should be skipped in search results.
    #[must_use]
    pub fn id(&self, node: NodeId) -> Option<u64> {
        self.node_to_id.get(&node).copied()
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_node.len()
    }

    /// Returns true if no nodes are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_node.is_empty()
    }

    /// Iterates over live node ids.
    pub fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_to_id.keys().copied()
    }
}
