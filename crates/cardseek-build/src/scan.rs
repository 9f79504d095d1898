//! Source image enumeration.
//!
//! Scans one flat directory of downloaded card images and recovers the
//! card id from each file stem via the filesystem codec. The scan does not
//! de-duplicate by id; merging is insert-only downstream, so recomputed
//! duplicates are idempotent.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cardseek_store::codec;
use tracing::debug;

/// Image extensions eligible for embedding (case-insensitive).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// A candidate source image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannedImage {
    /// Logical card id, decoded from the file stem.
    pub card_id: String,
    /// Path of the image file.
    pub path: PathBuf,
}

/// Enumerate all eligible images under `dir`, sorted by filename.
///
/// A missing directory is fatal — there is nothing to build from.
pub fn scan_images(dir: &Path) -> Result<Vec<ScannedImage>> {
    if !dir.is_dir() {
        bail!("card images directory not found: {}", dir.display());
    }

    let mut images = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading card images directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading entry in {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let eligible = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                let lower = e.to_ascii_lowercase();
                SUPPORTED_EXTENSIONS.contains(&lower.as_str())
            });
        if !eligible {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            debug!(path = %path.display(), "skipping file with non-UTF-8 stem");
            continue;
        };
        images.push(ScannedImage {
            card_id: codec::decode(stem),
            path,
        });
    }

    // Sorted for a deterministic work list across runs.
    images.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(images)
}
