//! Backfill orchestration
//!
//! The driver walks a cursor forward from the start time to the end time in
//! windows of `limit` candles, buffering everything it receives and
//! checkpointing the full buffer periodically and once at the end.
//!
//! # Quick Start
//!
//! ```no_run
//! use kline_backfill::downloader::{BackfillConfig, BackfillDriver, BackfillJob};
//! use kline_backfill::fetcher::{ClientConfig, RangeFetcher};
//! use kline_backfill::output::JsonCheckpointWriter;
//! use kline_backfill::Interval;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Arc::new(RangeFetcher::new(ClientConfig::default())?);
//! let sink = Box::new(JsonCheckpointWriter::new("bnbusdt_1h_prices.json"));
//! let config = BackfillConfig::default().with_checkpoint_every(10);
//!
//! let job = BackfillJob::new("BNBUSDT", Interval::OneHour, 1509926400000);
//! let report = BackfillDriver::new(fetcher, sink, config).run(job).await?;
//! assert!(report.records > 0);
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`executor`] - the driver state machine
//! - [`job`] - job description, loop state and the final report
//! - [`progress`] - checkpoint progress snapshots
//! - [`config`] - tunables, constants and backoff calculation
//!
//! # Error Handling
//!
//! Fetch failures never end a run on their own: the driver cools down and
//! retries the same window unless the configured policy says otherwise. Only
//! validation problems and a failed final checkpoint are returned as
//! [`DownloadError`].

pub mod config;
pub mod executor;
pub mod job;
pub mod progress;

pub use config::{BackfillConfig, PermanentErrorPolicy};
pub use executor::BackfillDriver;
pub use job::{BackfillJob, BackfillReport, BackfillState, CompletionStatus, DriverState};

use crate::output::OutputError;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Job parameters are unusable
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Final checkpoint could not be written
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),
}
