//! ONNX Runtime image encoder (feature-gated behind `ort`).
//!
//! Downloads the configured vision model via `hf-hub`, creates an `ort`
//! session, and runs one inference call per preprocessed batch. The raw
//! output keeps whatever rank the model emits; pooling and normalization
//! happen downstream.

use std::path::PathBuf;

use ndarray::{Array4, ArrayD, IxDyn};
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::errors::{EmbedError, Result};
use crate::service::ImageEncoder;

/// ONNX-based image encoder for the configured model.
pub struct OnnxImageEncoder {
    config: ModelConfig,
    cache_dir: Option<PathBuf>,
    session: Option<ort::session::Session>,
}

impl OnnxImageEncoder {
    /// Create a new encoder (not yet initialized).
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            cache_dir: None,
            session: None,
        }
    }

    /// Override the hf-hub cache directory.
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    /// Download the model if needed and create the ONNX session.
    ///
    /// Does blocking I/O (model download, file reads).
    pub fn initialize(&mut self) -> Result<()> {
        let session = initialize_inner(&self.config, self.cache_dir.as_deref())
            .map_err(|e| EmbedError::Internal(e.to_string()))?;
        self.session = Some(session);
        info!(model = %self.config.model_id, "ONNX image encoder ready");
        Ok(())
    }
}

/// Initialize the model: download via `hf-hub`, create the ONNX session.
///
/// Uses `Box<dyn Error>` internally so all calls can use `?` directly.
/// The caller maps the error to `EmbedError` at the boundary.
fn initialize_inner(
    config: &ModelConfig,
    cache_dir: Option<&std::path::Path>,
) -> std::result::Result<ort::session::Session, Box<dyn std::error::Error + Send + Sync>> {
    debug!(model = %config.model_id, file = %config.onnx_model, "downloading model via hf-hub");

    let mut builder = hf_hub::api::sync::ApiBuilder::new();
    if let Some(dir) = cache_dir {
        builder = builder.with_cache_dir(dir.to_path_buf());
    }
    let api = builder.build()?;

    let repo = api.model(config.model_id.clone());
    let model_path = repo.get(&config.onnx_model)?;

    info!(model = %model_path.display(), "model file ready");

    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .with_log_level(ort::logging::LogLevel::Warning)?
        .commit_from_file(&model_path)?;

    info!(model = %model_path.display(), "ONNX model loaded");
    Ok(session)
}

/// Run inference on one stacked batch.
///
/// Delegates to `run_inference_inner` which uses `Box<dyn Error>`
/// internally, then maps any error to `EmbedError::Inference`.
fn run_inference(
    session: &mut ort::session::Session,
    batch: &Array4<f32>,
) -> Result<ArrayD<f32>> {
    run_inference_inner(session, batch).map_err(|e| EmbedError::Inference(e.to_string()))
}

fn run_inference_inner(
    session: &mut ort::session::Session,
    batch: &Array4<f32>,
) -> std::result::Result<ArrayD<f32>, Box<dyn std::error::Error + Send + Sync>> {
    let (n, c, h, w) = batch.dim();
    let shape = vec![n as i64, c as i64, h as i64, w as i64];
    let (data, _) = batch.to_owned().into_raw_vec_and_offset();

    let input_tensor = ort::value::Tensor::from_array((shape, data))?;
    let outputs = session.run(ort::inputs![input_tensor])?;

    let output_value = &outputs[0];
    let (output_shape, output_data) = output_value.try_extract_tensor::<f32>()?;

    let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();
    if dims.first() != Some(&n) || !(dims.len() == 2 || dims.len() == 3) {
        return Err(format!("unexpected output shape: {output_shape:?}").into());
    }

    Ok(ArrayD::from_shape_vec(IxDyn(&dims), output_data.to_vec())?)
}

impl ImageEncoder for OnnxImageEncoder {
    fn encode_batch(&mut self, batch: &Array4<f32>) -> Result<ArrayD<f32>> {
        let session = self.session.as_mut().ok_or(EmbedError::NotReady)?;
        run_inference(session, batch)
    }

    fn dimensions(&self) -> usize {
        self.config.embedding_dim
    }

    fn is_ready(&self) -> bool {
        self.session.is_some()
    }
}
