//! Retry classification and log message formatting for the klines client.

use chrono::{DateTime, Utc};
use reqwest::{Error as ReqwestError, StatusCode};
use std::time::Duration;

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, DNS failure, or other offline scenarios
    NetworkOffline,
    /// HTTP 429 rate limit exceeded
    RateLimit,
    /// HTTP 5xx server error
    ServerError(u16),
    /// HTTP 200 whose body is not a klines array
    MalformedBody,
    /// HTTP 400 invalid request / bad symbol
    InvalidRequest,
    /// Authentication failures (401/403)
    AuthFailed(u16),
    /// Other client errors (4xx, except 429)
    ClientError(u16),
    /// Generic fallback when no better classification fits
    NetworkGeneric,
}

impl RetryErrorType {
    /// Short description used inside log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::MalformedBody => "malformed response body",
            Self::InvalidRequest => "invalid request",
            Self::AuthFailed(code) => match code {
                401 => "authentication failed (401)",
                403 => "authentication failed (403)",
                _ => "authentication failed",
            },
            Self::ClientError(code) => match code {
                404 => "resource not found",
                418 => "IP banned after repeated rate limit violations",
                451 => "unavailable due to restrictions",
                _ => "client error",
            },
            Self::NetworkGeneric => "network error",
        }
    }

    /// Suggested remediation printed with the final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check your network connection and firewall settings",
            Self::NetworkOffline => "Verify internet connectivity and DNS resolution",
            Self::RateLimit => "Increase --request-delay-ms or wait before restarting",
            Self::ServerError(_) => "Exchange may be experiencing issues, try again later",
            Self::MalformedBody => "Verify --base-url points at a klines-compatible API",
            Self::InvalidRequest => "Check symbol, interval, and start date for typos",
            Self::AuthFailed(_) => "The endpoint refused access; check regional restrictions",
            Self::ClientError(_) => "Review request parameters against the klines API docs",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }

    /// Whether another attempt can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            RetryErrorType::InvalidRequest
                | RetryErrorType::AuthFailed(_)
                | RetryErrorType::ClientError(_)
        )
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Attempts made so far (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Type of error that triggered retry
    pub error_type: RetryErrorType,
    /// Backoff duration until next attempt
    pub backoff_duration: Duration,
    /// Symbol being downloaded (e.g., "BNBUSDT")
    pub symbol: String,
    /// Requested window (start, end) in millis
    pub window: Option<(i64, i64)>,
    /// Original error message for details
    pub error_message: String,
}

impl RetryContext {
    /// Build a context for one failed attempt.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error_type: RetryErrorType,
        backoff_duration: Duration,
        symbol: impl Into<String>,
        window: Option<(i64, i64)>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type,
            backoff_duration,
            symbol: symbol.into(),
            window,
            error_message: error_message.into(),
        }
    }

    /// "Retrying (attempt 3/5) after rate limit exceeded - waiting 0.4 seconds... (BNBUSDT) ..."
    pub fn format_retry(&self) -> String {
        let mut message = format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds...",
            self.attempt + 1,
            self.max_attempts,
            self.error_type.description(),
            self.backoff_duration.as_secs_f64()
        );

        append_symbol_and_window(&mut message, &self.symbol, self.window);
        message
    }

    /// Message for an attempt that succeeded after earlier failures.
    pub fn format_success(&self) -> String {
        let mut message = format!(
            "Retry attempt {}/{} succeeded - resuming download",
            self.attempt, self.max_attempts
        );
        append_symbol_and_window(&mut message, &self.symbol, self.window);
        message
    }

    /// Multi-line summary once the budget is spent.
    pub fn format_failure(&self) -> String {
        let symbol_display = if self.symbol.is_empty() {
            "unknown"
        } else {
            &self.symbol
        };
        let window_display = self
            .window
            .map(|(start, end)| format!("{} to {}", format_timestamp(start), format_timestamp(end)))
            .unwrap_or_else(|| "unknown".to_string());

        let mut lines = vec![
            format!("[FAILED] Request failed after {} attempts", self.attempt),
            format!("  Last error: {}", self.error_message),
            format!("  Symbol: {symbol_display}"),
            format!("  Window: {window_display}"),
            "  Suggestions:".to_string(),
        ];
        lines.extend(
            self.format_suggestions()
                .into_iter()
                .map(|suggestion| format!("    - {suggestion}")),
        );
        lines.join("\n")
    }

    /// Suggestions tailored to the current context.
    pub fn format_suggestions(&self) -> Vec<String> {
        let mut suggestions = vec![self.error_type.suggestion().to_string()];
        if self.error_type.is_retryable() {
            suggestions.push(format!(
                "Try increasing --max-retries (current: {})",
                self.max_attempts
            ));
        }
        suggestions
    }
}

/// Classify an HTTP status and/or reqwest error.
pub fn extract_error_type(
    status: Option<StatusCode>,
    err: Option<&ReqwestError>,
) -> RetryErrorType {
    if let Some(status) = status {
        match status.as_u16() {
            400 => return RetryErrorType::InvalidRequest,
            401 | 403 => return RetryErrorType::AuthFailed(status.as_u16()),
            429 => return RetryErrorType::RateLimit,
            _ => {}
        }

        if status.is_server_error() {
            return RetryErrorType::ServerError(status.as_u16());
        }

        if status.is_client_error() {
            return RetryErrorType::ClientError(status.as_u16());
        }
    }

    if let Some(err) = err {
        if err.is_timeout() {
            return RetryErrorType::NetworkTimeout;
        }

        if err.is_connect() {
            return RetryErrorType::NetworkOffline;
        }

        if err.is_decode() {
            return RetryErrorType::MalformedBody;
        }
    }

    RetryErrorType::NetworkGeneric
}

fn append_symbol_and_window(buffer: &mut String, symbol: &str, window: Option<(i64, i64)>) {
    if !symbol.is_empty() {
        buffer.push_str(&format!(" ({symbol})"));
    }

    if let Some((start, end)) = window {
        buffer.push_str(&format!(
            " {} to {}",
            format_timestamp(start),
            format_timestamp(end)
        ));
    }
}

/// UTC `YYYY-MM-DD HH:MM` rendering of a millisecond timestamp.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}
