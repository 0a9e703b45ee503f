//! JSON checkpoint writer
//!
//! The series is stored as one compact array `[[open_time_ms,"close"],...]`.
//! Writes go to a temporary file in the destination directory which is synced
//! and renamed over the target, so readers never see a half-written file.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CheckpointSink, OutputError, OutputResult};
use crate::Candle;

/// Whole-file JSON checkpoint sink
#[derive(Debug, Clone)]
pub struct JsonCheckpointWriter {
    path: PathBuf,
    writes: u64,
}

impl JsonCheckpointWriter {
    /// Create a writer targeting `path`. Nothing is written until the first checkpoint.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writes: 0,
        }
    }

    /// Number of successful checkpoint writes
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl CheckpointSink for JsonCheckpointWriter {
    fn write_checkpoint(&mut self, candles: &[Candle]) -> OutputResult<()> {
        let bytes = serde_json::to_vec(candles)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;
        write_atomic(&self.path, &bytes)?;
        self.writes += 1;

        debug!(
            path = %self.path.display(),
            records = candles.len(),
            bytes = bytes.len(),
            "Checkpoint written"
        );
        Ok(())
    }

    fn destination(&self) -> &Path {
        &self.path
    }
}

/// Replace `path` with `bytes` via temp file + fsync + rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> OutputResult<()> {
    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent_dir).map_err(|e| {
        OutputError::IoError(format!(
            "Failed to create directory {}: {e}",
            parent_dir.display()
        ))
    })?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;
    temp_file
        .write_all(bytes)
        .map_err(|e| OutputError::IoError(format!("Failed to write to temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;
    temp_file
        .persist(path)
        .map_err(|e| OutputError::IoError(format!("Failed to persist temp file: {e}")))?;

    // Make the rename durable
    if let Ok(dir) = std::fs::File::open(parent_dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Read a series written by [`JsonCheckpointWriter`].
///
/// A missing file is an `IoError`; content that is not a candle array is
/// `CorruptCheckpoint`.
pub fn load_series(path: &Path) -> OutputResult<Vec<Candle>> {
    let contents = std::fs::read(path)
        .map_err(|e| OutputError::IoError(format!("Failed to read {}: {e}", path.display())))?;
    serde_json::from_slice(&contents).map_err(|e| OutputError::CorruptCheckpoint {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
