//! Klines client configuration
//!
//! Everything the HTTP layer needs is carried on [`ClientConfig`] and passed in
//! explicitly; there is no module-level session state.

use crate::downloader::config::{
    DEFAULT_BASE_URL, DEFAULT_KLINES_ENDPOINT, DEFAULT_PAGE_LIMIT, INITIAL_BACKOFF_MS,
    MAX_PAGE_LIMIT, MAX_RETRIES, REQUEST_TIMEOUT_SECS,
};
use std::time::Duration;

/// Configuration for the klines HTTP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL for the API (e.g., <https://api.binance.com>)
    pub base_url: String,

    /// Klines endpoint path (e.g., /api/v3/klines)
    pub klines_endpoint: String,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    /// Attempts made for one window before giving up
    pub max_retries: u32,

    /// Backoff before the first retry; doubles on each further retry
    pub backoff_base: Duration,

    /// Maximum candles requested per call
    pub limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            klines_endpoint: DEFAULT_KLINES_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            backoff_base: Duration::from_millis(INITIAL_BACKOFF_MS),
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the attempt budget (at least one attempt is always made)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Override the backoff base delay
    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Override the page limit, clamped to what the API accepts
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, MAX_PAGE_LIMIT);
        self
    }

    /// Full klines URL
    pub fn klines_url(&self) -> String {
        format!("{}{}", self.base_url, self.klines_endpoint)
    }
}
