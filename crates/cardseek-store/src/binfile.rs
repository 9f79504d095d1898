//! Binary embedding file — the compatibility artifact read by the
//! browser-side similarity search.
//!
//! Little-endian layout, written field by field because the byte layout is
//! an external contract:
//!
//! ```text
//! u32  record count
//! u32  embedding dimensionality
//! per record (sorted id order):
//!   u8           id length in encoded bytes
//!   [u8; len]    id bytes (UTF-8)
//!   [f32; dim]   embedding values
//! ```
//!
//! Ids whose UTF-8 encoding exceeds 255 bytes are excluded entirely (never
//! truncated) and reported. The format must not change without a version
//! marker.

use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::checkpoint::Checkpoint;
use crate::errors::{Result, StoreError};

/// Hard format limit on the encoded id length (one length byte).
const MAX_ID_BYTES: usize = 255;

/// Outcome of writing a binary embedding file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Records written to the file.
    pub written: usize,
    /// Ids excluded because their UTF-8 encoding exceeds 255 bytes.
    pub skipped: Vec<String>,
}

/// Write the full embedding set to `path`.
///
/// The file is produced in one pass after all processing completes —
/// never incrementally. Every vector must have exactly `dim` values;
/// a disagreement is a fatal dimension mismatch, not a skippable record.
pub fn write_embeddings(path: &Path, checkpoint: &Checkpoint, dim: usize) -> Result<WriteReport> {
    let mut report = WriteReport::default();
    let mut eligible: Vec<(&String, &Vec<f32>)> = Vec::with_capacity(checkpoint.len());

    for (id, vector) in checkpoint.iter() {
        if vector.len() != dim {
            return Err(StoreError::DimensionMismatch {
                expected: dim,
                found: vector.len(),
            });
        }
        if id.len() > MAX_ID_BYTES {
            warn!(id_bytes = id.len(), "card id too long for format, skipping");
            report.skipped.push(id.clone());
            continue;
        }
        eligible.push((id, vector));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = std::fs::File::create(path)?;
    let mut out = BufWriter::new(file);

    out.write_all(&(eligible.len() as u32).to_le_bytes())?;
    out.write_all(&(dim as u32).to_le_bytes())?;

    for (id, vector) in &eligible {
        out.write_all(&[id.len() as u8])?;
        out.write_all(id.as_bytes())?;
        for value in vector.iter() {
            out.write_all(&value.to_le_bytes())?;
        }
    }
    out.flush()?;

    report.written = eligible.len();
    info!(
        path = %path.display(),
        records = report.written,
        skipped = report.skipped.len(),
        dim,
        "binary embedding file written"
    );
    Ok(report)
}

/// Read a binary embedding file, validating against the expected
/// dimensionality.
///
/// Files whose declared dimensionality differs from `expected_dim`, or
/// which hold fewer bytes than the header promises, are rejected as
/// corrupt — there is no partial recovery.
pub fn read_embeddings(path: &Path, expected_dim: usize) -> Result<Checkpoint> {
    let bytes = std::fs::read(path)?;
    let mut cursor = 0usize;

    let count = read_u32(&bytes, &mut cursor)? as usize;
    let dim = read_u32(&bytes, &mut cursor)? as usize;
    if dim != expected_dim {
        return Err(StoreError::DimensionMismatch {
            expected: expected_dim,
            found: dim,
        });
    }

    let mut checkpoint = Checkpoint::new();
    for _ in 0..count {
        let id_len = *bytes
            .get(cursor)
            .ok_or_else(|| truncated("id length"))? as usize;
        cursor += 1;

        let id_bytes = bytes
            .get(cursor..cursor + id_len)
            .ok_or_else(|| truncated("id bytes"))?;
        cursor += id_len;
        let id = std::str::from_utf8(id_bytes)
            .map_err(|e| StoreError::CorruptBinaryFile(format!("non-UTF-8 id: {e}")))?
            .to_string();

        let float_bytes = bytes
            .get(cursor..cursor + dim * 4)
            .ok_or_else(|| truncated("embedding values"))?;
        cursor += dim * 4;
        let vector: Vec<f32> = float_bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let _ = checkpoint.merge([(id, vector)]);
    }

    Ok(checkpoint)
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32> {
    let slice = bytes
        .get(*cursor..*cursor + 4)
        .ok_or_else(|| truncated("header"))?;
    *cursor += 4;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn truncated(what: &str) -> StoreError {
    StoreError::CorruptBinaryFile(format!("truncated while reading {what}"))
}
