//! Resume from an existing checkpoint file
//!
//! A checkpoint is the complete series written so far, so resuming means
//! preloading it and continuing after its last candle.

use crate::output::{load_series, OutputError, OutputResult};
use crate::Candle;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

pub mod lock;

pub use lock::CheckpointLock;

/// How an existing destination file is treated at start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeMode {
    /// Preload the file and continue after its last candle
    #[default]
    On,
    /// Ignore the file; it is overwritten by the first checkpoint
    Off,
    /// Delete the file before starting
    Reset,
}

impl FromStr for ResumeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" => Ok(ResumeMode::On),
            "off" => Ok(ResumeMode::Off),
            "reset" => Ok(ResumeMode::Reset),
            _ => Err(format!("Invalid resume mode: {s}. Valid options: on, off, reset")),
        }
    }
}

/// Existing candles to preload for `mode`.
///
/// With [`ResumeMode::On`] an unreadable file is an error rather than being
/// silently overwritten.
pub fn load_existing(path: &Path, mode: ResumeMode) -> OutputResult<Vec<Candle>> {
    match mode {
        ResumeMode::Off => Ok(Vec::new()),
        ResumeMode::Reset => {
            if path.exists() {
                std::fs::remove_file(path).map_err(|e| {
                    OutputError::IoError(format!("Failed to remove {}: {e}", path.display()))
                })?;
                info!(path = %path.display(), "Removed existing checkpoint");
            }
            Ok(Vec::new())
        }
        ResumeMode::On => {
            if !path.exists() {
                return Ok(Vec::new());
            }
            let mut candles = load_series(path)?;
            if !candles.windows(2).all(|pair| pair[0].open_time < pair[1].open_time) {
                warn!(path = %path.display(), "Checkpoint not strictly ordered, sorting");
                candles.sort_by_key(|c| c.open_time);
                candles.dedup_by_key(|c| c.open_time);
            }
            info!(
                path = %path.display(),
                records = candles.len(),
                last_open_time = candles.last().map(|c| c.open_time),
                "Loaded existing checkpoint"
            );
            Ok(candles)
        }
    }
}
