//! Observability metrics for backfill runs
//!
//! Uses the `metrics` facade; the macros are no-ops until [`init_metrics`]
//! installs the Prometheus exporter.

use crate::fetcher::retry_formatter::RetryErrorType;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

static METRICS_ADDR: OnceCell<SocketAddr> = OnceCell::new();

/// Install the Prometheus exporter on `addr`. Later calls are ignored.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    if let Some(existing) = METRICS_ADDR.get() {
        debug!(addr = %existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!("http_requests_total", Unit::Count, "Klines requests issued");
    describe_counter!("http_429_errors_total", Unit::Count, "Rate limit responses received");
    describe_counter!("http_retries_total", Unit::Count, "Retry attempts");
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "Klines request duration"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Backoff slept before a retry"
    );
    describe_gauge!("api_weight_used", Unit::Count, "Request weight used in the current minute");
    describe_counter!("backfill_checkpoints_total", Unit::Count, "Checkpoint writes");
    describe_counter!("backfill_empty_windows_total", Unit::Count, "Windows without candles");
    describe_counter!("backfill_runs_total", Unit::Count, "Finished backfill runs");

    let _ = METRICS_ADDR.set(addr);
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Timing and status of one HTTP attempt
pub struct RequestMetrics {
    start_time: Instant,
    attempt: u32,
}

impl RequestMetrics {
    /// Start timing attempt number `attempt` (1-based)
    pub fn start(attempt: u32) -> Self {
        Self {
            start_time: Instant::now(),
            attempt,
        }
    }

    /// Record a response with `status_code`
    pub fn record_complete(&self, status_code: u16) {
        counter!(
            "http_requests_total",
            "status" => status_code.to_string(),
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds").record(self.start_time.elapsed().as_secs_f64());

        if status_code == 429 {
            counter!("http_429_errors_total").increment(1);
        }
    }

    /// Record a transport failure (no status code)
    pub fn record_network_error(&self) {
        counter!(
            "http_requests_total",
            "status" => "network_error",
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds").record(self.start_time.elapsed().as_secs_f64());
    }
}

/// Record a backoff sleep before retry number `attempt`
pub fn record_retry_backoff(duration: Duration, attempt: u32, error_type: RetryErrorType) {
    counter!(
        "http_retries_total",
        "attempt" => attempt.to_string(),
        "reason" => error_type.description(),
    )
    .increment(1);
    histogram!("retry_backoff_duration_seconds").record(duration.as_secs_f64());
}

/// Record the used-weight header value
pub fn record_used_weight(weight: u32) {
    gauge!("api_weight_used").set(f64::from(weight));
}

/// Record a checkpoint write of `records` candles
pub fn record_checkpoint(records: usize) {
    counter!("backfill_checkpoints_total").increment(1);
    gauge!("backfill_buffered_records").set(records as f64);
}

/// Record a window that returned no candles
pub fn record_empty_window() {
    counter!("backfill_empty_windows_total").increment(1);
}

/// Per-run metrics
pub struct BackfillMetrics {
    symbol: String,
    interval: String,
    start_time: Instant,
}

impl BackfillMetrics {
    /// Start tracking a run
    pub fn start(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            start_time: Instant::now(),
        }
    }

    /// Record that the run ended with `status`
    pub fn record_finished(&self, status: &str, records: usize) {
        counter!(
            "backfill_runs_total",
            "symbol" => self.symbol.clone(),
            "interval" => self.interval.clone(),
            "status" => status.to_string(),
        )
        .increment(1);

        debug!(
            symbol = %self.symbol,
            interval = %self.interval,
            status = %status,
            records,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Backfill metrics recorded"
        );
    }
}
