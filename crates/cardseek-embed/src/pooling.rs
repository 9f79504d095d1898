//! Pooling and L2 normalization of raw model outputs.
//!
//! Pooling runs strictly **before** normalization. Reversing the order
//! yields vectors that are close but not identical to the browser
//! pipeline's, which silently breaks cross-pipeline similarity search.

use ndarray::{Array2, ArrayD, Axis, Ix2};

use crate::config::Pooling;
use crate::errors::{EmbedError, Result};

/// Floor for the normalization divisor, so a degenerate all-zero output
/// stays finite instead of raising a division error.
pub const NORM_EPSILON: f32 = 1e-12;

/// Compute the L2 (Euclidean) norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// L2-normalize a vector in-place with an epsilon-floored divisor.
pub fn l2_normalize_floored(v: &mut [f32]) {
    let divisor = l2_norm(v).max(NORM_EPSILON);
    for x in v.iter_mut() {
        *x /= divisor;
    }
}

/// Collapse a raw model output to `(batch, dim)`.
///
/// A 3-axis `(batch, seq, dim)` output is mean-pooled over the sequence
/// axis, or reduced to the first sequence position for `Cls`. A 2-axis
/// output passes through unchanged. Any other rank is an inference error.
pub fn pool(output: ArrayD<f32>, pooling: Pooling) -> Result<Array2<f32>> {
    let pooled = match output.ndim() {
        2 => output,
        3 => {
            if output.shape()[1] == 0 {
                return Err(EmbedError::Inference("empty sequence axis".into()));
            }
            match pooling {
                Pooling::Mean => output
                    .mean_axis(Axis(1))
                    .ok_or_else(|| EmbedError::Inference("empty sequence axis".into()))?,
                Pooling::Cls => output.index_axis(Axis(1), 0).to_owned(),
            }
        }
        rank => {
            return Err(EmbedError::Inference(format!(
                "unexpected output rank {rank}, want (batch, dim) or (batch, seq, dim)"
            )));
        }
    };
    pooled
        .into_dimensionality::<Ix2>()
        .map_err(|e| EmbedError::Inference(format!("pooled output not 2-axis: {e}")))
}

/// Pool a raw output and optionally L2-normalize each row.
///
/// Returns one vector per batch item, in batch order.
pub fn pool_and_normalize(
    output: ArrayD<f32>,
    pooling: Pooling,
    normalize: bool,
) -> Result<Vec<Vec<f32>>> {
    let pooled = pool(output, pooling)?;
    let mut rows: Vec<Vec<f32>> = pooled.rows().into_iter().map(|r| r.to_vec()).collect();
    if normalize {
        for row in &mut rows {
            l2_normalize_floored(row);
        }
    }
    Ok(rows)
}
