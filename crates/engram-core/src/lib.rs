//! # `Engram` Core
//!
//! Composite approximate-retrieval memory engine for multi-agent systems.
//!
//! `Engram` stores content-bearing records produced by independent agents and
//! answers three kinds of questions about them with tunable accuracy:
//! definitely-not-present exact membership, approximate access frequency, and
//! nearest-neighbor similarity over embeddings. A background control loop
//! decays stale records, evicts under capacity pressure, and promotes hot
//! records for cross-agent visibility.
//!
//! ## Components
//!
//! - **Bloom filter**: append-only exact membership, trusted negatives
//! - **Cuckoo filter**: deletable membership, authoritative liveness
//! - **Count-min sketch**: access frequency estimation, aged by decay
//! - **LSH bucket index**: O(1) coarse similarity candidates
//! - **Proximity graph**: layered O(log n) high-recall similarity search
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use engram_core::{EngramConfig, MemoryCore, MemoryRecord};
//!
//! let core = MemoryCore::new(EngramConfig::default())?;
//!
//! core.store(MemoryRecord::new(1, "the sky is blue", embedding, "agent-a"))?;
//!
//! // Exact lookup: a miss is definitive, a hit is confirmed canonical.
//! let hit = core.lookup_exact("agent-a", "the sky is blue")?;
//!
//! // Similarity lookup: min_recall picks the LSH or graph path.
//! let similar = core.lookup_similar("agent-a", &query, 10, 0.9)?;
//!
//! // Cross-agent promotion.
//! core.mark_breakthrough(1)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// Numeric casts are pervasive in the filter/sketch sizing math; keep the
// global allows narrow and prefer try_from in new code.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]

pub mod config;
#[cfg(test)]
mod config_tests;
pub mod core;
pub mod distance;
pub mod error;
#[cfg(test)]
mod error_tests;
pub mod filter;
pub mod index;
pub mod metrics;
pub mod record;
#[cfg(test)]
mod record_tests;
pub mod sketch;
#[cfg(test)]
mod sketch_tests;

pub use config::{
    ConfigError, DecayConfig, EngineConfig, EngramConfig, FilterConfig, GraphConfig, LoggingConfig,
    LshConfig, SketchConfig,
};
pub use crate::core::{EngineState, MaintenanceHandle, MemoryCore};
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use filter::{BloomFilter, CuckooFilter};
pub use index::{GraphHits, LshIndex, NavGraph};
pub use metrics::{LatencyRecorder, MetricsSnapshot};
pub use record::{content_key, MemoryRecord, ScoredRecord, SearchResponse};
pub use sketch::FrequencySketch;
