//! Engram configuration module.
//!
//! Provides configuration file support via `engram.toml`, environment
//! variables, and runtime overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`ENGRAM_*`)
//! 2. Configuration file (`engram.toml`)
//! 3. Default values

use crate::distance::DistanceMetric;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration file.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Engine-level configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Embedding dimension, fixed process-wide at construction.
    pub dimension: usize,
    /// Maximum number of canonical records before eviction kicks in.
    pub capacity: usize,
    /// Distance metric shared by the bucket index and the proximity graph.
    pub metric: DistanceMetric,
    /// Importance threshold above which a record is promoted to `shared`.
    pub promotion_threshold: f32,
    /// `min_recall` values below this route similarity queries through the
    /// LSH bucket index instead of the proximity graph.
    pub recall_threshold: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            capacity: 100_000,
            metric: DistanceMetric::Euclidean,
            promotion_threshold: 0.85,
            recall_threshold: 0.5,
        }
    }
}

/// Membership filter configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Target false-positive rate for the exact-membership filter.
    pub bloom_fpr: f64,
    /// Cuckoo filter slack: bucket capacity is `engine.capacity * headroom`.
    pub cuckoo_headroom: f64,
    /// Maximum displacement attempts before the cuckoo filter reports
    /// `CapacityExceeded`.
    pub cuckoo_max_kicks: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            bloom_fpr: 0.01,
            cuckoo_headroom: 1.25,
            cuckoo_max_kicks: 500,
        }
    }
}

/// Frequency sketch configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SketchConfig {
    /// Relative overcount bound (epsilon). Width = ceil(e / epsilon).
    pub epsilon: f64,
    /// Failure probability (delta). Depth = ceil(ln(1 / delta)).
    pub delta: f64,
    /// Access count at which a record is considered maximally hot.
    pub hotness_saturation: u32,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.001,
            delta: 0.01,
            hotness_saturation: 32,
        }
    }
}

/// Locality-sensitive bucket index configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LshConfig {
    /// Number of independent hash tables.
    pub tables: usize,
    /// Random hyperplanes (signature bits) per table.
    pub hyperplanes: usize,
}

impl Default for LshConfig {
    fn default() -> Self {
        Self {
            tables: 8,
            hyperplanes: 12,
        }
    }
}

/// Proximity graph configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Connections per node (M). Layer 0 allows 2*M.
    pub max_connections: usize,
    /// Candidate pool size during construction.
    pub ef_construction: usize,
    /// Candidate pool size during search.
    pub ef_search: usize,
    /// Maximum nodes visited per search before returning a partial result.
    pub visit_budget: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_connections: 16,
            ef_construction: 200,
            ef_search: 128,
            visit_budget: 10_000,
        }
    }
}

/// Decay configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Seconds between maintenance (decay + eviction) passes.
    pub interval_secs: u64,
    /// Baseline importance retention per pass, in (0, 1). Cold records are
    /// multiplied by roughly this factor each pass; hot records retain more.
    pub decay_rate: f32,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            decay_rate: 0.90,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
    /// Log format: text or json.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Main engram configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngramConfig {
    /// Engine-level configuration.
    pub engine: EngineConfig,
    /// Membership filter configuration.
    pub filters: FilterConfig,
    /// Frequency sketch configuration.
    pub sketch: SketchConfig,
    /// LSH bucket index configuration.
    pub lsh: LshConfig,
    /// Proximity graph configuration.
    pub graph: GraphConfig,
    /// Decay configuration.
    pub decay: DecayConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl EngramConfig {
    /// Loads configuration from default sources.
    ///
    /// Priority: defaults < `engram.toml` < environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("engram.toml")
    }

    /// Loads configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ENGRAM_").split("_").lowercase(false));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.dimension == 0 || self.engine.dimension > 65536 {
            return Err(ConfigError::InvalidValue {
                key: "engine.dimension".to_string(),
                message: format!(
                    "value {} is out of range [1, 65536]",
                    self.engine.dimension
                ),
            });
        }

        if self.engine.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "engine.capacity".to_string(),
                message: "value must be >= 1".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.engine.promotion_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "engine.promotion_threshold".to_string(),
                message: format!(
                    "value {} is out of range [0, 1]",
                    self.engine.promotion_threshold
                ),
            });
        }

        if !(0.0..1.0).contains(&self.filters.bloom_fpr) || self.filters.bloom_fpr <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "filters.bloom_fpr".to_string(),
                message: format!("value {} is out of range (0, 1)", self.filters.bloom_fpr),
            });
        }

        if self.filters.cuckoo_headroom < 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "filters.cuckoo_headroom".to_string(),
                message: format!("value {} must be >= 1.0", self.filters.cuckoo_headroom),
            });
        }

        if self.sketch.epsilon <= 0.0 || self.sketch.delta <= 0.0 || self.sketch.delta >= 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "sketch".to_string(),
                message: "epsilon must be > 0 and delta in (0, 1)".to_string(),
            });
        }

        if self.lsh.tables == 0 || self.lsh.hyperplanes == 0 || self.lsh.hyperplanes > 64 {
            return Err(ConfigError::InvalidValue {
                key: "lsh".to_string(),
                message: "tables must be >= 1 and hyperplanes in [1, 64]".to_string(),
            });
        }

        if !(4..=128).contains(&self.graph.max_connections) {
            return Err(ConfigError::InvalidValue {
                key: "graph.max_connections".to_string(),
                message: format!(
                    "value {} is out of range [4, 128]",
                    self.graph.max_connections
                ),
            });
        }

        if !(16..=4096).contains(&self.graph.ef_search) {
            return Err(ConfigError::InvalidValue {
                key: "graph.ef_search".to_string(),
                message: format!("value {} is out of range [16, 4096]", self.graph.ef_search),
            });
        }

        if !(0.0..1.0).contains(&self.decay.decay_rate) || self.decay.decay_rate <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "decay.decay_rate".to_string(),
                message: format!("value {} is out of range (0, 1)", self.decay.decay_rate),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                message: format!(
                    "value '{}' is invalid, expected one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        Ok(())
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
