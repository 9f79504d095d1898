//! Model configuration shared with the browser pipeline.
//!
//! The JSON document parsed here is the same file the browser-side
//! transformers.js pipeline reads. It must stay byte-identical between the
//! two consumers — any drift in preprocessing or inference settings produces
//! embeddings that are numerically close but not comparable.
//!
//! Every field is required; a missing or mistyped field fails the load
//! rather than silently substituting a default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{EmbedError, Result};

/// Square-crop strategy applied before resizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropMethod {
    /// Full-width top square, horizontally centered (captures card artwork).
    Top,
    /// Centered square.
    Center,
    /// No crop; the resize step stretches anisotropically to square.
    None,
}

/// Pooling strategy for 3-axis model outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Average over the sequence axis. The only mode verified against the
    /// browser pipeline.
    Mean,
    /// First sequence position (class/summary token).
    Cls,
}

/// Preprocessing settings, matched bit-for-bit with the browser.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessSettings {
    /// Target square size in pixels.
    pub image_size: u32,
    /// Per-channel mean for normalization.
    pub mean: [f32; 3],
    /// Per-channel standard deviation for normalization.
    pub std: [f32; 3],
    /// Square-crop strategy.
    pub crop_method: CropMethod,
}

/// Inference settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceSettings {
    /// Pooling strategy for sequence outputs.
    pub pooling: Pooling,
    /// Whether to L2-normalize pooled vectors.
    pub normalize: bool,
}

/// Output artifact settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSettings {
    /// Path of the binary embedding file, relative to the working directory.
    pub embeddings_file: PathBuf,
}

/// Full model configuration document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    /// Hugging Face model repository id.
    pub model_id: String,
    /// ONNX model file within the repository.
    pub onnx_model: String,
    /// Quantization dtype (informational, logged at startup).
    pub dtype: String,
    /// Output embedding dimensionality.
    pub embedding_dim: usize,
    /// Preprocessing settings.
    pub preprocessing: PreprocessSettings,
    /// Inference settings.
    pub inference: InferenceSettings,
    /// Output settings.
    pub output: OutputSettings,
}

impl ModelConfig {
    /// Load and validate the configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EmbedError::ConfigMissing(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EmbedError::Config(format!("read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| EmbedError::Config(format!("parse {}: {e}", path.display())))?;
        config.validate()?;
        tracing::info!(
            model = %config.model_id,
            dtype = %config.dtype,
            dim = config.embedding_dim,
            size = config.preprocessing.image_size,
            crop = ?config.preprocessing.crop_method,
            "model config loaded"
        );
        Ok(config)
    }

    /// Validate field values that the type system cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(EmbedError::Config("embeddingDim must be positive".into()));
        }
        if self.preprocessing.image_size == 0 {
            return Err(EmbedError::Config(
                "preprocessing.imageSize must be positive".into(),
            ));
        }
        if self.preprocessing.std.iter().any(|s| *s == 0.0) {
            return Err(EmbedError::Config(
                "preprocessing.std must not contain zeros".into(),
            ));
        }
        // Only mean pooling is verified against the browser pipeline; the
        // cls fallback exists for callers that construct a config in code.
        if self.inference.pooling != Pooling::Mean {
            return Err(EmbedError::Config(format!(
                "unsupported pooling strategy {:?}: only \"mean\" matches the browser pipeline",
                self.inference.pooling
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL_DOC: &str = r#"{
        "modelId": "Xenova/mobileclip_s2",
        "onnxModel": "onnx/vision_model_fp16.onnx",
        "dtype": "fp16",
        "embeddingDim": 512,
        "preprocessing": {
            "imageSize": 256,
            "mean": [0.0, 0.0, 0.0],
            "std": [1.0, 1.0, 1.0],
            "cropMethod": "top"
        },
        "inference": { "pooling": "mean", "normalize": true },
        "output": { "embeddingsFile": "public/embeddings.bin" }
    }"#;

    fn parse(doc: &str) -> serde_json::Result<ModelConfig> {
        serde_json::from_str(doc)
    }

    #[test]
    fn full_document_parses() {
        let config = parse(FULL_DOC).unwrap();
        assert_eq!(config.model_id, "Xenova/mobileclip_s2");
        assert_eq!(config.embedding_dim, 512);
        assert_eq!(config.preprocessing.image_size, 256);
        assert_eq!(config.preprocessing.crop_method, CropMethod::Top);
        assert_eq!(config.inference.pooling, Pooling::Mean);
        assert!(config.inference.normalize);
        assert_eq!(
            config.output.embeddings_file,
            PathBuf::from("public/embeddings.bin")
        );
        config.validate().unwrap();
    }

    #[test]
    fn missing_field_is_rejected() {
        let doc = FULL_DOC.replace("\"embeddingDim\": 512,", "");
        assert!(parse(&doc).is_err());
    }

    #[test]
    fn unknown_crop_method_is_rejected() {
        let doc = FULL_DOC.replace("\"top\"", "\"bottom\"");
        assert!(parse(&doc).is_err());
    }

    #[test]
    fn unknown_pooling_is_rejected() {
        let doc = FULL_DOC.replace("\"mean\"", "\"max\"");
        assert!(parse(&doc).is_err());
    }

    #[test]
    fn cls_pooling_parses_but_fails_validation() {
        let doc = FULL_DOC.replace("\"pooling\": \"mean\"", "\"pooling\": \"cls\"");
        let config = parse(&doc).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, EmbedError::Config(_)));
        assert!(err.to_string().contains("unsupported pooling"));
    }

    #[test]
    fn zero_std_fails_validation() {
        let doc = FULL_DOC.replace("\"std\": [1.0, 1.0, 1.0]", "\"std\": [1.0, 0.0, 1.0]");
        let config = parse(&doc).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_dim_fails_validation() {
        let doc = FULL_DOC.replace("\"embeddingDim\": 512", "\"embeddingDim\": 0");
        let config = parse(&doc).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_missing_file_is_config_missing() {
        let err = ModelConfig::load(Path::new("/no/such/model-config.json")).unwrap_err();
        assert!(matches!(err, EmbedError::ConfigMissing(_)));
    }

    #[test]
    fn load_from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-config.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(FULL_DOC.as_bytes()).unwrap();
        let config = ModelConfig::load(&path).unwrap();
        assert_eq!(config.dtype, "fp16");
    }

    #[test]
    fn load_malformed_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model-config.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = ModelConfig::load(&path).unwrap_err();
        assert!(matches!(err, EmbedError::Config(_)));
    }

    #[test]
    fn serde_uses_camel_case() {
        let config = parse(FULL_DOC).unwrap();
        let value = serde_json::to_value(&config).unwrap();
        assert!(value.get("modelId").is_some());
        assert!(value.get("embeddingDim").is_some());
        assert!(value["preprocessing"].get("imageSize").is_some());
        assert!(value["preprocessing"].get("cropMethod").is_some());
        assert!(value["output"].get("embeddingsFile").is_some());
        assert!(value.get("model_id").is_none());
    }
}
