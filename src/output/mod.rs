//! Checkpoint output

use crate::Candle;
use std::path::Path;

pub mod json;
pub mod path;

pub use json::{load_series, JsonCheckpointWriter};

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Existing checkpoint file could not be read back
    #[error("corrupt checkpoint {path}: {reason}")]
    CorruptCheckpoint {
        /// File that failed to parse
        path: String,
        /// Parser message
        reason: String,
    },

    /// Another process holds the checkpoint lock
    #[error("lock error: {0}")]
    LockError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for whole-series checkpoints.
///
/// Every call replaces the previous content: after a successful return the
/// destination holds exactly `candles`.
pub trait CheckpointSink: Send {
    /// Persist the full series
    fn write_checkpoint(&mut self, candles: &[Candle]) -> OutputResult<()>;

    /// Where the series is written
    fn destination(&self) -> &Path;
}
