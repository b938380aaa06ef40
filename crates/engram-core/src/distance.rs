//! Distance metrics for embedding similarity calculations.
//!
//! The bucket index and the proximity graph share these primitives, so both
//! structures rank candidates identically. Every metric is expressed as a
//! *distance* (lower = more similar), which keeps the graph's best-first
//! search and the engine's result ordering uniform:
//!
//! - **Cosine**: `1 - cosine_similarity`, 0 for identical directions
//! - **Euclidean**: L2 norm of the difference
//! - **Dot product**: negated inner product (maximum inner product search)

use serde::{Deserialize, Serialize};

/// Distance metric for embedding similarity calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine distance (`1 - cosine_similarity`).
    /// Best for normalized vectors, commonly used with text embeddings.
    Cosine,

    /// Euclidean distance (L2 norm).
    /// Best for spatial data and when magnitude matters.
    #[default]
    Euclidean,

    /// Negated dot product (inner product).
    /// Best for maximum inner product search (MIPS).
    DotProduct,
}

impl DistanceMetric {
    /// Calculates the distance between two vectors using this metric.
    ///
    /// Lower values always indicate higher similarity; an exact self-match
    /// yields 0 for `Cosine` and `Euclidean`.
    ///
    /// # Panics
    ///
    /// Panics if vectors have different dimensions. Callers go through the
    /// engine, which validates dimensions before any structure is touched.
    #[must_use]
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "dimension mismatch in distance");
        match self {
            Self::Cosine => cosine_distance(a, b),
            Self::Euclidean => euclidean_distance(a, b),
            Self::DotProduct => -dot_product(a, b),
        }
    }

    /// Sorts `(id, distance)` results ascending, best match first.
    pub fn sort_results(&self, results: &mut [(u64, f32)]) {
        results.sort_by(|a, b| a.1.total_cmp(&b.1));
    }
}

#[inline]
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

#[inline]
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        // Zero vector: maximally dissimilar to everything
        return 1.0;
    }

    1.0 - dot / denom
}
