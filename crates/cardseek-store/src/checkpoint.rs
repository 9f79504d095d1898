//! Durable, resumable checkpoint of computed embeddings.
//!
//! The checkpoint is an internal artifact: a JSON object mapping card ids
//! to float arrays. It only ever grows during a run, is flushed on an
//! item-count threshold, and is deleted once the final binary file has
//! been written. The on-disk format is free to change between runs as long
//! as `load` and `flush` agree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{Result, StoreError};

/// In-memory mapping of card id to embedding vector.
///
/// Backed by a `BTreeMap`, so iteration (and therefore the binary file's
/// record order) is sorted by id and deterministic across runs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint {
    entries: BTreeMap<String, Vec<f32>>,
}

impl Checkpoint {
    /// Create an empty checkpoint.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge new records; existing ids are never overwritten.
    ///
    /// Returns the number of records actually inserted.
    pub fn merge(&mut self, records: impl IntoIterator<Item = (String, Vec<f32>)>) -> usize {
        let mut inserted = 0;
        for (id, vector) in records {
            if let std::collections::btree_map::Entry::Vacant(slot) = self.entries.entry(id) {
                let _ = slot.insert(vector);
                inserted += 1;
            }
        }
        inserted
    }

    /// Whether an id already has a computed embedding.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Embedding for an id, if present.
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    /// Iterate entries in sorted id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<f32>)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the checkpoint is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Filesystem-backed checkpoint persistence.
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store persisting to the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the persisted checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted checkpoint, or an empty one if none exists.
    ///
    /// A file that exists but cannot be parsed is fatal: a malformed
    /// checkpoint has no safe partial-recovery semantics.
    pub fn load(&self) -> Result<Checkpoint> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no checkpoint file, starting empty");
            return Ok(Checkpoint::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&raw)
            .map_err(|e| StoreError::CorruptCheckpoint(format!("{}: {e}", self.path.display())))?;
        info!(
            path = %self.path.display(),
            entries = checkpoint.len(),
            "checkpoint loaded"
        );
        Ok(checkpoint)
    }

    /// Persist the full checkpoint, replacing any prior content.
    ///
    /// Writes to a sibling temporary file and renames it over the
    /// checkpoint path, so an interruption mid-flush leaves either the old
    /// or the new checkpoint — never a torn one.
    pub fn flush(&self, checkpoint: &Checkpoint) -> Result<()> {
        let json = serde_json::to_string(checkpoint)
            .map_err(|e| StoreError::CorruptCheckpoint(format!("serialize: {e}")))?;

        let mut tmp_name = self
            .path
            .file_name()
            .map_or_else(|| std::ffi::OsString::from("checkpoint"), ToOwned::to_owned);
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        info!(
            path = %self.path.display(),
            entries = checkpoint.len(),
            "checkpoint flushed"
        );
        Ok(())
    }

    /// Remove the persisted checkpoint.
    ///
    /// Called only after the binary embedding file has been fully written.
    pub fn discard(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "checkpoint removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
