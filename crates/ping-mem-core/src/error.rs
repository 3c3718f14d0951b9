//! Typed error taxonomy for the core retrieval and knowledge plane.
//!
//! Every public operation in this crate returns [`Result`]. Each variant
//! below corresponds to one of the error kinds in the specification's
//! error-handling design: recoverable conditions (not-found, cache miss)
//! are returned as structured `Option`/`Ok(false)` results rather than
//! errors; only genuine failures reach this enum. Transports external to
//! this crate translate these into their own error envelopes.

use thiserror::Error;

/// Result alias used throughout `ping-mem-core`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A vector's length didn't match the store's configured dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An entity, relationship, or memory id was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A vector or graph backend was unreachable.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// One of the hybrid search modes (semantic/keyword/graph) failed.
    #[error("search mode '{mode}' failed: {message}")]
    SearchModeFailure { mode: &'static str, message: String },

    /// Embedding computation failed (provider error or cache corruption).
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// BM25 or vector upsert failed after the BM25 write already landed.
    #[error("indexing failed after partial write: {0}")]
    IndexingFailure(String),

    /// Schema violation, empty required field, malformed ISO date, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation exceeded its configured budget.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Caller cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal invariant was violated; logged with enough context to
    /// reproduce.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl Error {
    pub fn search_mode(mode: &'static str, cause: impl std::fmt::Display) -> Self {
        Error::SearchModeFailure {
            mode,
            message: cause.to_string(),
        }
    }
}
