//! Embedding pipeline error types.
//!
//! Per-item and per-batch errors are recoverable — the batch engine counts
//! them and keeps going. Configuration errors are fatal before a run starts.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the embedding pipeline.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The shared model configuration file does not exist.
    #[error("Config file not found: {0}")]
    ConfigMissing(PathBuf),

    /// The configuration is malformed or fails validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A single image could not be decoded (per-item, recovered by skipping).
    #[error("Failed to load image {path}: {cause}")]
    ImageLoad {
        /// Path of the image that failed to decode.
        path: PathBuf,
        /// Underlying decode failure.
        cause: String,
    },

    /// Inference failed for a whole batch (per-batch, recovered by skipping).
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Encoder used before the model was loaded.
    #[error("Image encoder not ready")]
    NotReady,

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

/// Result alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedError>;
