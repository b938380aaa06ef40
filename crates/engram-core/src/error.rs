//! Error types for the engram memory core.
//!
//! A single unified error type for all engine operations, suitable for
//! exposure across an API boundary. Error codes follow the pattern
//! `MEM-XXX` for easy debugging.

use thiserror::Error;

/// Result type alias for engram operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in memory-core operations.
///
/// Validation errors (`InvalidDimension`, `DuplicateId`, `UnknownRecord`) are
/// always detected before any structural mutation; a failed call never leaves
/// partial state behind.
#[derive(Error, Debug)]
pub enum Error {
    /// Embedding dimension mismatch (MEM-001).
    #[error("[MEM-001] Embedding dimension mismatch: expected {expected}, got {actual}")]
    InvalidDimension {
        /// Dimension the engine was constructed with.
        expected: usize,
        /// Dimension of the offending embedding.
        actual: usize,
    },

    /// Record id already in use (MEM-002).
    #[error("[MEM-002] Record id {0} already exists")]
    DuplicateId(u64),

    /// Operation referenced a record that does not exist (MEM-003).
    #[error("[MEM-003] Record with id {0} not found")]
    UnknownRecord(u64),

    /// A membership structure ran out of placement room (MEM-004).
    ///
    /// Surfaced to callers only after one automatic eviction retry failed.
    #[error("[MEM-004] Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Configuration error (MEM-005).
    #[error("[MEM-005] Configuration error: {0}")]
    Config(String),

    /// Internal error (MEM-006).
    ///
    /// Indicates an unexpected inconsistency between structures. Please
    /// report if encountered.
    #[error("[MEM-006] Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code (e.g., "MEM-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidDimension { .. } => "MEM-001",
            Self::DuplicateId(_) => "MEM-002",
            Self::UnknownRecord(_) => "MEM-003",
            Self::CapacityExceeded(_) => "MEM-004",
            Self::Config(_) => "MEM-005",
            Self::Internal(_) => "MEM-006",
        }
    }

    /// Returns true if this error is recoverable by the caller.
    ///
    /// Capacity and validation errors can be remediated (evict, fix input);
    /// internal errors cannot.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
