//! Storage error types.
//!
//! Corrupt persisted state is fatal on read — there are no safe
//! partial-recovery semantics for a malformed header.

use thiserror::Error;

/// Errors from checkpoint and binary-file operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem I/O failed (preserves source chain).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted checkpoint could not be deserialized.
    #[error("Corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),

    /// The binary embedding file is malformed or truncated.
    #[error("Corrupt embedding file: {0}")]
    CorruptBinaryFile(String),

    /// Declared dimensionality disagrees with the caller's expectation.
    #[error("Embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Dimensionality the caller expects.
        expected: usize,
        /// Dimensionality found in the data.
        found: usize,
    },
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
