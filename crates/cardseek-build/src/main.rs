//! `cardseek-build` — batch-embed a directory of card images into the
//! binary index consumed by the browser-side similarity search.
//!
//! The run is resumable: interrupt it at any point and a re-run picks up
//! from the last checkpoint flush instead of re-embedding everything.

#![deny(unsafe_code)]

mod engine;
mod scan;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use cardseek_embed::ModelConfig;
use cardseek_store::CheckpointStore;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::engine::{BatchEngine, EngineConfig};

#[derive(Parser, Debug)]
#[command(name = "cardseek-build", version, about = "Build the card embedding index")]
struct Cli {
    /// Model configuration file shared with the browser pipeline.
    #[arg(long, default_value = "model-config.json")]
    config: PathBuf,

    /// Directory of downloaded card images.
    #[arg(long, default_value = "card-images")]
    images_dir: PathBuf,

    /// Images embedded per inference call.
    #[arg(long, default_value_t = 16)]
    batch_size: usize,

    /// Checkpoint flush threshold, in newly embedded images.
    #[arg(long, default_value_t = 500)]
    checkpoint_interval: usize,

    /// Checkpoint file path.
    #[arg(long, default_value = "embeddings-checkpoint.json")]
    checkpoint_file: PathBuf,

    /// Output path, overriding the config's embeddingsFile.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Cache directory for downloaded model files.
    #[arg(long)]
    model_cache_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();
    if args.batch_size == 0 {
        bail!("--batch-size must be at least 1");
    }
    if args.checkpoint_interval == 0 {
        bail!("--checkpoint-interval must be at least 1");
    }

    let model = ModelConfig::load(&args.config)
        .with_context(|| format!("loading model config {}", args.config.display()))?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| model.output.embeddings_file.clone());

    let mut encoder = build_encoder(&model, args.model_cache_dir.clone())?;
    let store = CheckpointStore::new(args.checkpoint_file.clone());
    let engine = BatchEngine::new(
        &model,
        EngineConfig {
            batch_size: args.batch_size,
            checkpoint_interval: args.checkpoint_interval,
        },
        store,
    );

    let summary = engine.run(&args.images_dir, encoder.as_mut(), &output)?;
    info!(
        scanned = summary.scanned,
        already_done = summary.already_done,
        processed = summary.processed,
        failed = summary.failed,
        written = summary.written,
        output = %output.display(),
        "build finished"
    );
    if summary.failed > 0 {
        tracing::warn!(
            failed = summary.failed,
            "some images could not be embedded and are absent from the output"
        );
    }
    Ok(())
}

#[cfg(feature = "ort")]
fn build_encoder(
    model: &ModelConfig,
    cache_dir: Option<PathBuf>,
) -> Result<Box<dyn cardseek_embed::ImageEncoder>> {
    use cardseek_embed::ort_service::OnnxImageEncoder;

    let mut encoder = OnnxImageEncoder::new(model.clone());
    if let Some(dir) = cache_dir {
        encoder = encoder.with_cache_dir(dir);
    }
    encoder
        .initialize()
        .with_context(|| format!("initializing ONNX session for {}", model.model_id))?;
    Ok(Box::new(encoder))
}

#[cfg(not(feature = "ort"))]
fn build_encoder(
    _model: &ModelConfig,
    _cache_dir: Option<PathBuf>,
) -> Result<Box<dyn cardseek_embed::ImageEncoder>> {
    bail!("compiled without the `ort` feature; rebuild with `--features ort` to run inference")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::parse_from(["cardseek-build"]);
        assert_eq!(cli.config, PathBuf::from("model-config.json"));
        assert_eq!(cli.images_dir, PathBuf::from("card-images"));
        assert_eq!(cli.batch_size, 16);
        assert_eq!(cli.checkpoint_interval, 500);
        assert_eq!(cli.checkpoint_file, PathBuf::from("embeddings-checkpoint.json"));
        assert!(cli.output.is_none());
        assert!(cli.model_cache_dir.is_none());
    }

    #[test]
    fn all_flags_parse() {
        let cli = Cli::parse_from([
            "cardseek-build",
            "--config",
            "cfg/model.json",
            "--images-dir",
            "imgs",
            "--batch-size",
            "8",
            "--checkpoint-interval",
            "50",
            "--checkpoint-file",
            "ckpt.json",
            "--output",
            "out/embeddings.bin",
            "--model-cache-dir",
            "/tmp/models",
        ]);
        assert_eq!(cli.config, PathBuf::from("cfg/model.json"));
        assert_eq!(cli.images_dir, PathBuf::from("imgs"));
        assert_eq!(cli.batch_size, 8);
        assert_eq!(cli.checkpoint_interval, 50);
        assert_eq!(cli.checkpoint_file, PathBuf::from("ckpt.json"));
        assert_eq!(cli.output, Some(PathBuf::from("out/embeddings.bin")));
        assert_eq!(cli.model_cache_dir, Some(PathBuf::from("/tmp/models")));
    }

    #[test]
    fn non_numeric_batch_size_is_rejected() {
        assert!(Cli::try_parse_from(["cardseek-build", "--batch-size", "lots"]).is_err());
    }
}
