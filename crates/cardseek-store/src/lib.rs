//! # cardseek-store
//!
//! Persistence for the embedding build pipeline:
//! - Card-id <-> filesystem-name codec (bijective over the permitted set)
//! - Durable, resumable checkpoint store with atomic replacement
//! - The binary embedding file consumed by the browser-side search

#![deny(unsafe_code)]

pub mod binfile;
pub mod checkpoint;
pub mod codec;
pub mod errors;

pub use binfile::{WriteReport, read_embeddings, write_embeddings};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use errors::{Result, StoreError};
