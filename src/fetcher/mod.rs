//! Klines fetching: one bounded request per call, classified and retried.

use crate::{Candle, FetchWindow, Interval};
use async_trait::async_trait;

pub mod binance_config;
pub mod binance_http;
pub mod binance_parser;
pub mod range;
pub mod retry_formatter;

pub use binance_config::ClientConfig;
pub use range::RangeFetcher;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Non-retryable client error (4xx other than 429)
    #[error("client error {status}: {body}")]
    ClientError {
        /// HTTP status code
        status: u16,
        /// Response body as returned by the API
        body: String,
    },

    /// Retry budget spent on transient failures
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Description of the final failure
        last_error: String,
    },

    /// Response parse error
    #[error("parse error: {0}")]
    ParseError(String),

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}

impl FetcherError {
    /// Whether retrying the same request can never succeed
    pub fn is_permanent(&self) -> bool {
        matches!(self, FetcherError::ClientError { .. })
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Source of klines for the backfill driver.
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// Fetch the candles whose open time falls within `window`, ordered by open time.
    ///
    /// An empty vector means the window had no trades; it is not an error.
    async fn fetch_range(
        &self,
        symbol: &str,
        interval: Interval,
        window: FetchWindow,
    ) -> FetcherResult<Vec<Candle>>;

    /// Most candles one `fetch_range` call returns; windows are sized to it.
    fn limit(&self) -> u32;

    /// Earliest open time available for `symbol`/`interval`, or `None` when unknown.
    async fn first_open_time(&self, symbol: &str, interval: Interval) -> Option<i64>;
}
