//! # cardseek-embed
//!
//! Deterministic card-image embedding pipeline.
//!
//! Mirrors the browser-side transformers.js pipeline numerically:
//! - Decode -> square crop -> bilinear resize -> [0,1] scale -> mean/std
//!   normalize -> NCHW tensor
//! - One ONNX inference call per batch via `ort` (feature-gated)
//! - Mean pooling over the sequence axis **before** L2 normalization
//!
//! The inference engine is an opaque tensor-in/tensor-out boundary
//! (`ImageEncoder`); everything on either side of it is deterministic.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
#[cfg(feature = "ort")]
pub mod ort_service;
pub mod pooling;
pub mod preprocess;
pub mod service;

pub use config::{CropMethod, ModelConfig, Pooling};
pub use errors::{EmbedError, Result};
pub use service::{ImageEncoder, MockImageEncoder};
