//! Batch embedding engine.
//!
//! Drives one build run end to end: scan the image directory, subtract
//! work already present in the checkpoint, embed the remainder in fixed
//! batches, flush the checkpoint on an item-count threshold, then write
//! the binary file and discard the checkpoint. Per-item and per-batch
//! failures are counted and skipped; checkpoint corruption, flush
//! failures, and final-write failures abort the run.

use std::path::Path;

use anyhow::{Context, Result};
use cardseek_embed::{ImageEncoder, ModelConfig, pooling, preprocess};
use cardseek_store::{Checkpoint, CheckpointStore, binfile};
use ndarray::Array4;
use tracing::{info, warn};

use crate::scan::{self, ScannedImage};

/// Run-level tunables, from the CLI.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Images embedded per inference call.
    pub batch_size: usize,
    /// Checkpoint flush threshold, in newly embedded items.
    pub checkpoint_interval: usize,
}

/// What one run did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Images found in the source directory.
    pub scanned: usize,
    /// Images skipped because the checkpoint already held their id.
    pub already_done: usize,
    /// Images embedded during this run.
    pub processed: usize,
    /// Images that failed to decode or embed.
    pub failed: usize,
    /// Records written to the binary file.
    pub written: usize,
    /// Ids excluded from the binary file as over-length.
    pub excluded_ids: Vec<String>,
}

/// One embedding build run over a directory of card images.
pub struct BatchEngine<'a> {
    model: &'a ModelConfig,
    config: EngineConfig,
    store: CheckpointStore,
}

impl<'a> BatchEngine<'a> {
    pub fn new(model: &'a ModelConfig, config: EngineConfig, store: CheckpointStore) -> Self {
        Self {
            model,
            config,
            store,
        }
    }

    /// Execute the run and produce a summary.
    ///
    /// The binary file is always written at the end, even when nothing new
    /// was embedded, so a re-run after adding zero images still refreshes
    /// the artifact from the checkpoint.
    pub fn run(
        &self,
        images_dir: &Path,
        encoder: &mut dyn ImageEncoder,
        output_path: &Path,
    ) -> Result<RunSummary> {
        let images = scan::scan_images(images_dir)?;
        let mut checkpoint = self.store.load().context("loading checkpoint")?;

        let work: Vec<&ScannedImage> = images
            .iter()
            .filter(|image| !checkpoint.contains(&image.card_id))
            .collect();
        let mut summary = RunSummary {
            scanned: images.len(),
            already_done: images.len() - work.len(),
            ..RunSummary::default()
        };
        info!(
            scanned = summary.scanned,
            already_done = summary.already_done,
            to_process = work.len(),
            "starting embedding run"
        );

        let mut since_flush = 0usize;
        for (batch_index, chunk) in work.chunks(self.config.batch_size.max(1)).enumerate() {
            let (ids, tensors) = self.decode_batch(chunk, &mut summary);
            if ids.is_empty() {
                continue;
            }

            match self.embed_batch(&ids, &tensors, encoder) {
                Ok(rows) => {
                    summary.processed += rows.len();
                    since_flush += rows.len();
                    let _ = checkpoint.merge(ids.into_iter().zip(rows));
                }
                Err(e) => {
                    warn!(batch = batch_index, count = ids.len(), error = %e, "batch failed");
                    summary.failed += ids.len();
                    continue;
                }
            }

            if since_flush >= self.config.checkpoint_interval.max(1) {
                self.store
                    .flush(&checkpoint)
                    .context("flushing checkpoint")?;
                since_flush = 0;
            }
        }

        if since_flush > 0 {
            self.store
                .flush(&checkpoint)
                .context("flushing checkpoint")?;
        }

        let report = binfile::write_embeddings(output_path, &checkpoint, self.model.embedding_dim)
            .with_context(|| format!("writing {}", output_path.display()))?;
        summary.written = report.written;
        summary.excluded_ids = report.skipped;
        self.store.discard().context("removing checkpoint")?;

        info!(
            processed = summary.processed,
            failed = summary.failed,
            written = summary.written,
            "embedding run complete"
        );
        Ok(summary)
    }

    /// Decode and preprocess one chunk; items that fail are counted and
    /// dropped from the batch.
    fn decode_batch(
        &self,
        chunk: &[&ScannedImage],
        summary: &mut RunSummary,
    ) -> (Vec<String>, Vec<Array4<f32>>) {
        let mut ids = Vec::with_capacity(chunk.len());
        let mut tensors = Vec::with_capacity(chunk.len());
        for image in chunk {
            match preprocess::preprocess_file(&image.path, &self.model.preprocessing) {
                Ok(tensor) => {
                    ids.push(image.card_id.clone());
                    tensors.push(tensor);
                }
                Err(e) => {
                    warn!(card_id = %image.card_id, error = %e, "failed to preprocess image");
                    summary.failed += 1;
                }
            }
        }
        (ids, tensors)
    }

    /// Run one inference call and reduce it to normalized embedding rows.
    fn embed_batch(
        &self,
        ids: &[String],
        tensors: &[Array4<f32>],
        encoder: &mut dyn ImageEncoder,
    ) -> Result<Vec<Vec<f32>>> {
        let batch = preprocess::stack_batch(tensors)?;
        let output = encoder.encode_batch(&batch)?;
        let rows = pooling::pool_and_normalize(
            output,
            self.model.inference.pooling,
            self.model.inference.normalize,
        )?;

        if rows.len() != ids.len() {
            anyhow::bail!(
                "encoder returned {} rows for {} images",
                rows.len(),
                ids.len()
            );
        }
        for row in &rows {
            if row.len() != self.model.embedding_dim {
                anyhow::bail!(
                    "encoder produced {}-dimensional rows, config says {}",
                    row.len(),
                    self.model.embedding_dim
                );
            }
        }
        Ok(rows)
    }
}
