//! Error type for all engine operations.
//!
//! Every fallible public operation surfaces one of these variants at the
//! operation boundary. Validation and [`Error::NotFound`] are recoverable by
//! the caller; [`Error::Corrupted`], [`Error::Io`], and [`Error::Internal`]
//! abort the operation without leaving the store half-mutated.

use thiserror::Error;

/// Errors produced by the vicinity engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A collection or store was configured with a zero dimension.
    #[error("invalid dimension: {0} (must be > 0)")]
    InvalidDimension(usize),

    /// A vector or query did not match the collection dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// An empty string was supplied as a vector id.
    #[error("id cannot be empty")]
    EmptyId,

    /// `insert` was called for an id that is already alive.
    #[error("id already exists: {0}")]
    DuplicateId(String),

    /// A metric string was not one of `l2` / `cosine`.
    #[error("unknown metric: {0} (use l2|cosine)")]
    InvalidMetric(String),

    /// A filter specification could not be parsed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A required entity (e.g. the collection manifest) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Search was attempted before `build_index()` (and no filter was given).
    #[error("index not ready: call build_index() or open a collection with a saved index")]
    IndexNotReady,

    /// Two artifacts that must agree on a count disagreed.
    #[error("size mismatch in {what}: expected {expected}, got {got}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// An on-disk artifact failed validation (bad magic, malformed line, ...).
    #[error("corrupted state: {0}")]
    Corrupted(String),

    /// Underlying file I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal invariant was violated. Should not occur.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
