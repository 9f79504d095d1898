//! Image encoder trait and mock implementation.
//!
//! The encoder is the opaque boundary of the pipeline: a batch tensor of
//! shape `(N, 3, size, size)` goes in, a raw output of shape `(N, dim)` or
//! `(N, seq, dim)` comes out. One blocking call per batch, no partial
//! results.

use ndarray::{Array4, ArrayD, Axis, IxDyn};
use sha2::{Digest, Sha256};

use crate::errors::{EmbedError, Result};

/// Trait for encoding preprocessed image batches into raw model outputs.
pub trait ImageEncoder {
    /// Run one inference call over a stacked batch tensor.
    fn encode_batch(&mut self, batch: &Array4<f32>) -> Result<ArrayD<f32>>;

    /// Output embedding dimensionality.
    fn dimensions(&self) -> usize;

    /// Whether the encoder is ready for inference.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Mock encoder for testing the pipeline without a model.
///
/// Produces deterministic outputs by hashing each item's tensor bytes with
/// SHA-256 and mapping the hash bytes to vector components, so the same
/// image always yields the same embedding across runs.
pub struct MockImageEncoder {
    dims: usize,
    seq_len: Option<usize>,
    fail: bool,
}

impl MockImageEncoder {
    /// Create a mock that emits 2-axis `(batch, dims)` outputs.
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            seq_len: None,
            fail: false,
        }
    }

    /// Emit 3-axis `(batch, seq, dims)` outputs to exercise pooling.
    pub fn with_seq_len(mut self, seq_len: usize) -> Self {
        self.seq_len = Some(seq_len);
        self
    }

    /// Make every `encode_batch` call fail with an inference error.
    pub fn set_fail(&mut self, fail: bool) {
        self.fail = fail;
    }

    fn hash_to_vector(&self, item_bytes: &[u8], position: usize) -> Vec<f32> {
        let mut hasher = Sha256::new();
        hasher.update(item_bytes);
        hasher.update((position as u64).to_le_bytes());
        let hash = hasher.finalize();
        (0..self.dims)
            .map(|i| {
                let byte = hash[i % hash.len()];
                // Map byte to [-1, 1], perturbed by index so dims > 32 vary.
                (f32::from(byte) / 127.5) - 1.0 + (i / hash.len()) as f32 * 1e-3
            })
            .collect()
    }
}

impl ImageEncoder for MockImageEncoder {
    fn encode_batch(&mut self, batch: &Array4<f32>) -> Result<ArrayD<f32>> {
        if self.fail {
            return Err(EmbedError::Inference("mock inference failure".into()));
        }
        let n = batch.dim().0;
        let seq = self.seq_len.unwrap_or(1);

        let mut data = Vec::with_capacity(n * seq * self.dims);
        for i in 0..n {
            let item = batch.index_axis(Axis(0), i);
            let item_bytes: Vec<u8> = item
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect();
            for p in 0..seq {
                data.extend(self.hash_to_vector(&item_bytes, p));
            }
        }

        let shape: Vec<usize> = match self.seq_len {
            Some(seq_len) => vec![n, seq_len, self.dims],
            None => vec![n, self.dims],
        };
        ArrayD::from_shape_vec(IxDyn(&shape), data)
            .map_err(|e| EmbedError::Internal(format!("mock output shape: {e}")))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
