//! Similarity indexes for the memory core.
//!
//! Two approximate indexes with different cost/recall tradeoffs, sharing the
//! [`crate::distance::DistanceMetric`] primitive:
//! - [`LshIndex`]: O(1) coarse candidate retrieval (low recall, re-ranked)
//! - [`NavGraph`]: O(log n) navigable-graph search (high recall)

pub mod graph;
pub mod lsh;

pub use graph::{GraphHits, NavGraph};
pub use lsh::LshIndex;
