//! Record data structure: the atomic unit of stored knowledge.

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::hash::{Hash, Hasher};

/// A record in the memory core.
///
/// A record consists of:
/// - A unique identifier
/// - An opaque content payload
/// - An embedding used for similarity comparisons
/// - Importance and sharing state managed by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier for the record.
    pub id: u64,

    /// Opaque content payload, immutable once stored.
    pub content: String,

    /// The embedding. Dimension is fixed process-wide at engine construction.
    pub embedding: Vec<f32>,

    /// Importance score in [0, 1]. Raised by access reinforcement and
    /// breakthrough marking, lowered only by decay.
    #[serde(default)]
    pub importance: f32,

    /// Creation timestamp (Unix seconds).
    #[serde(default)]
    pub created_at: u64,

    /// Last successful read timestamp (Unix seconds).
    #[serde(default)]
    pub last_accessed_at: u64,

    /// Identifier of the originating agent.
    pub agent: String,

    /// True once the record has been promoted and is visible to all agents.
    #[serde(default)]
    pub shared: bool,

    /// True once the record has been explicitly marked as a breakthrough.
    /// Breakthrough records are shared and additionally exempt from decay;
    /// records promoted by hot access alone share but keep decaying.
    #[serde(default)]
    pub breakthrough: bool,

    /// Optional JSON metadata carried opaquely alongside the content.
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

impl MemoryRecord {
    /// Creates a new record with the given id, content, embedding and owner.
    ///
    /// Timestamps are filled in by the engine at store time.
    #[must_use]
    pub fn new(id: u64, content: impl Into<String>, embedding: Vec<f32>, agent: &str) -> Self {
        Self {
            id,
            content: content.into(),
            embedding,
            importance: 0.0,
            created_at: 0,
            last_accessed_at: 0,
            agent: agent.to_string(),
            shared: false,
            breakthrough: false,
            metadata: None,
        }
    }

    /// Sets the initial importance score, clamped to [0, 1].
    #[must_use]
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Attaches JSON metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Returns the dimension of the embedding.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }

    /// Returns the filter key for this record's content.
    #[must_use]
    pub fn content_key(&self) -> u64 {
        content_key(&self.content)
    }

    /// Returns true if `agent` may see this record.
    #[must_use]
    pub fn visible_to(&self, agent: &str) -> bool {
        self.shared || self.agent == agent
    }
}

/// Computes the 64-bit digest used to key the membership filters.
///
/// All structures that index by content hash through this single function so
/// the bloom pre-check, the cuckoo confirmation and the canonical lookup
/// agree on the key space.
#[must_use]
pub fn content_key(content: &str) -> u64 {
    let mut hasher = FxHasher::default();
    content.hash(&mut hasher);
    hasher.finish()
}

/// A similarity search hit: a record and its distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    /// The matching record.
    pub record: MemoryRecord,

    /// Distance to the query (lower is more similar).
    pub distance: f32,
}

impl ScoredRecord {
    /// Creates a new scored record.
    #[must_use]
    pub const fn new(record: MemoryRecord, distance: f32) -> Self {
        Self { record, distance }
    }
}

/// Response of a similarity lookup.
///
/// `partial` is true when the proximity graph exhausted its visit budget and
/// returned the best candidates found so far. This is a bounded-work outcome,
/// not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Ranked hits, best match first.
    pub results: Vec<ScoredRecord>,

    /// True if the search stopped early on its visit budget.
    pub partial: bool,
}
