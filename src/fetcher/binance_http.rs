//! Klines HTTP client
//!
//! Issues one request at a time and classifies the outcome:
//! - 2xx: body decoded (a blank body counts as an empty array)
//! - 429, 5xx, transport failures, undecodable 2xx bodies: retried after
//!   `backoff_base * 2^attempt`
//! - other 4xx: returned immediately as [`FetcherError::ClientError`]

use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::downloader::config::calculate_backoff;
use crate::fetcher::retry_formatter::{extract_error_type, RetryContext, RetryErrorType};
use crate::fetcher::{ClientConfig, FetcherError, FetcherResult};
use crate::metrics::{self, RequestMetrics};
use crate::FetchWindow;

/// Header carrying the request weight used in the current minute
const USED_WEIGHT_HEADER: &str = "X-MBX-USED-WEIGHT-1M";

/// HTTP client for the klines endpoint
pub struct BinanceHttpClient {
    client: Client,
    config: ClientConfig,
}

impl BinanceHttpClient {
    /// Build a client honoring the configured request timeout
    pub fn new(config: ClientConfig) -> FetcherResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetcherError::ClientSetup(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Attempts made per request before giving up
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries.max(1)
    }

    /// GET the klines endpoint with `params`, decoding a successful body with `decode`.
    ///
    /// `symbol` and `window` only feed log messages.
    pub async fn get<T, F>(
        &self,
        params: &[(&str, String)],
        symbol: &str,
        window: FetchWindow,
        decode: F,
    ) -> FetcherResult<T>
    where
        F: Fn(Value) -> FetcherResult<T>,
    {
        let url = self.config.klines_url();
        let max_attempts = self.max_retries();
        let window_bounds = Some((window.start_time, window.end_time));
        let mut last_failure = (RetryErrorType::NetworkGeneric, String::new());

        for attempt in 0..max_attempts {
            debug!(
                attempt = attempt + 1,
                max_attempts,
                url = %url,
                params = ?params,
                "Request attempt"
            );
            let request_metrics = RequestMetrics::start(attempt + 1);

            let (error_type, message) = match self.client.get(&url).query(params).send().await {
                Err(e) => {
                    request_metrics.record_network_error();
                    (extract_error_type(None, Some(&e)), format!("network error: {e}"))
                }
                Ok(response) => {
                    let status = response.status();
                    request_metrics.record_complete(status.as_u16());
                    self.record_weight(response.headers());

                    if status.is_success() {
                        match response.text().await {
                            Ok(text) => match parse_body(&text).and_then(&decode) {
                                Ok(data) => {
                                    if attempt > 0 {
                                        let ctx = RetryContext::new(
                                            attempt + 1,
                                            max_attempts,
                                            last_failure.0,
                                            Duration::ZERO,
                                            symbol,
                                            window_bounds,
                                            "",
                                        );
                                        info!("{}", ctx.format_success());
                                    }
                                    debug!(
                                        start_time = window.start_time,
                                        end_time = window.end_time,
                                        "Successful request"
                                    );
                                    return Ok(data);
                                }
                                Err(e) => (RetryErrorType::MalformedBody, e.to_string()),
                            },
                            Err(e) => (
                                extract_error_type(None, Some(&e)),
                                format!("failed to read body: {e}"),
                            ),
                        }
                    } else {
                        let error_type = extract_error_type(Some(status), None);
                        let body = response.text().await.unwrap_or_default();
                        if !error_type.is_retryable() {
                            error!(
                                status = status.as_u16(),
                                body = %body,
                                params = ?params,
                                "API error ({}), not retrying",
                                error_type.description()
                            );
                            return Err(FetcherError::ClientError {
                                status: status.as_u16(),
                                body,
                            });
                        }
                        (error_type, format!("HTTP {}: {}", status.as_u16(), body))
                    }
                }
            };

            if attempt + 1 < max_attempts {
                let backoff = calculate_backoff(self.config.backoff_base, attempt);
                let ctx = RetryContext::new(
                    attempt + 1,
                    max_attempts,
                    error_type,
                    backoff,
                    symbol,
                    window_bounds,
                    message.as_str(),
                );
                warn!(error = %message, "{}", ctx.format_retry());
                metrics::record_retry_backoff(backoff, attempt + 1, error_type);
                tokio::time::sleep(backoff).await;
            }

            last_failure = (error_type, message);
        }

        let (error_type, message) = last_failure;
        let ctx = RetryContext::new(
            max_attempts,
            max_attempts,
            error_type,
            Duration::ZERO,
            symbol,
            window_bounds,
            message.as_str(),
        );
        error!(params = ?params, "{}", ctx.format_failure());

        Err(FetcherError::RetriesExhausted {
            attempts: max_attempts,
            last_error: message,
        })
    }

    fn record_weight(&self, headers: &HeaderMap) {
        if let Some(weight) = parse_weight_header(headers) {
            debug!(used_weight = weight, "Response weight");
            metrics::record_used_weight(weight);
        }
    }
}

/// Blank bodies decode as an empty array
fn parse_body(text: &str) -> FetcherResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Array(Vec::new()));
    }
    serde_json::from_str(text)
        .map_err(|e| FetcherError::ParseError(format!("Failed to deserialize response: {e}")))
}

/// Extract the used-weight header, if present and numeric
fn parse_weight_header(headers: &HeaderMap) -> Option<u32> {
    let weight_str = headers.get(USED_WEIGHT_HEADER)?.to_str().ok()?;

    match weight_str.parse::<u32>() {
        Ok(weight) => Some(weight),
        Err(e) => {
            warn!("Failed to parse weight header '{}': {}", weight_str, e);
            None
        }
    }
}
