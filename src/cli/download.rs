//! Command-line surface and the download command

use crate::downloader::config::{
    CHECKPOINT_EVERY_REQUESTS, ERROR_COOLDOWN_SECS, MAX_CONSECUTIVE_EMPTY_WINDOWS,
    REQUEST_DELAY_MS,
};
use crate::downloader::{
    BackfillConfig, BackfillDriver, BackfillJob, BackfillReport, DownloadError,
    PermanentErrorPolicy,
};
use crate::fetcher::retry_formatter::format_timestamp;
use crate::fetcher::{ClientConfig, RangeFetcher};
use crate::output::path::prices_path;
use crate::output::JsonCheckpointWriter;
use crate::resume::{load_existing, CheckpointLock, ResumeMode};
use crate::shutdown::SharedShutdown;
use crate::Interval;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::{AnalyzeArgs, CliError};

/// Start date accepted by `--start-date`
const START_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a start date as UTC.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, RFC3339, or a bare `YYYY-MM-DD` (midnight).
pub fn parse_start_date(input: &str) -> Result<i64, CliError> {
    let input = input.trim();

    if let Ok(dt) = NaiveDateTime::parse_from_str(input, START_DATE_FORMAT) {
        return Ok(dt.and_utc().timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.timestamp_millis());
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|e| {
        CliError::InvalidArgument(format!(
            "Invalid start date '{input}' (expected YYYY-MM-DD HH:MM:SS): {e}"
        ))
    })?;
    let datetime = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::InvalidArgument("Invalid start date".to_string()))?;
    Ok(datetime.and_utc().timestamp_millis())
}

/// Kline backfill CLI
#[derive(Parser, Debug)]
#[command(name = "kline-backfill")]
#[command(about = "Backfill historical klines and analyze price changes", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Attempts per request before a window counts as failed (default: 5, range: 1-20)
    #[arg(long, global = true, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: u32,

    /// API base URL (default: https://api.binance.com)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Serve Prometheus metrics on this address (e.g., 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the close-price series of a symbol
    Download(DownloadArgs),

    /// Compute price changes and frequency analysis from a downloaded series
    Analyze(AnalyzeArgs),
}

/// Download command arguments
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// Trading symbol
    #[arg(long, default_value = "BNBUSDT")]
    pub symbol: String,

    /// Start date in UTC (YYYY-MM-DD HH:MM:SS)
    #[arg(long, default_value = "2017-11-06 00:00:00")]
    pub start_date: String,

    /// Candle interval (1m, 3m, 5m, 15m, 30m, 1h, 2h, 4h, 6h, 8h, 12h, 1d, 3d, 1w, 1M)
    #[arg(long, default_value = "1m")]
    pub interval: Interval,

    /// Output file (default: {symbol}_{interval}_prices.json)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Resume mode: on, off, or reset
    #[arg(long, default_value = "on")]
    pub resume: ResumeMode,

    /// Start at --start-date without looking up the first trading timestamp
    #[arg(long, default_value_t = false)]
    pub no_probe: bool,

    /// Reaction to non-retryable API errors: retry or abort
    #[arg(long, default_value = "retry")]
    pub on_permanent_error: PermanentErrorPolicy,

    /// Abort after a single window failed this many times in a row
    #[arg(long)]
    pub max_window_failures: Option<u32>,

    /// Checkpoint after every N non-empty requests (0 = only at the end)
    #[arg(long, default_value_t = CHECKPOINT_EVERY_REQUESTS)]
    pub checkpoint_every: u64,

    /// Consecutive empty windows tolerated before aborting
    #[arg(long, default_value_t = MAX_CONSECUTIVE_EMPTY_WINDOWS)]
    pub max_empty_windows: u32,

    /// Pause between successful requests in milliseconds
    #[arg(long, default_value_t = REQUEST_DELAY_MS)]
    pub request_delay_ms: u64,

    /// Pause after a failed window in seconds
    #[arg(long, default_value_t = ERROR_COOLDOWN_SECS)]
    pub cooldown_secs: u64,

    /// Name 1m output {symbol}_minute_prices.json
    #[arg(long, default_value_t = false)]
    pub minute_naming: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl DownloadArgs {
    /// Destination file for this download
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            prices_path(Path::new("."), &self.symbol, self.interval, self.minute_naming)
        })
    }

    /// Client configuration from the global flags
    pub fn client_config(&self, cli: &Cli) -> ClientConfig {
        let config = ClientConfig::default().with_max_retries(cli.max_retries);
        match &cli.base_url {
            Some(url) => config.with_base_url(url.as_str()),
            None => config,
        }
    }

    /// Driver configuration from the download flags
    pub fn backfill_config(&self) -> BackfillConfig {
        BackfillConfig::default()
            .with_request_delay(Duration::from_millis(self.request_delay_ms))
            .with_error_cooldown(Duration::from_secs(self.cooldown_secs))
            .with_checkpoint_every(self.checkpoint_every)
            .with_max_empty_windows(self.max_empty_windows)
            .with_probe(!self.no_probe)
            .with_permanent_error_policy(self.on_permanent_error)
            .with_max_window_failures(self.max_window_failures)
    }

    /// Run the download
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let start_time = parse_start_date(&self.start_date)?;
        let output = self.output_path();

        let mut lock = CheckpointLock::open(&output)?;
        let _guard = lock.try_hold()?;

        let existing = load_existing(&output, self.resume)?;
        let fetcher = RangeFetcher::new(self.client_config(cli))?;
        let sink = JsonCheckpointWriter::new(&output);
        let job = BackfillJob::new(self.symbol.as_str(), self.interval, start_time)
            .with_existing(existing);

        info!(
            symbol = %self.symbol,
            interval = %self.interval,
            start = %format_timestamp(start_time),
            output = %output.display(),
            "Starting {} {} download",
            self.symbol,
            self.interval
        );

        let mut driver = BackfillDriver::new(Arc::new(fetcher), Box::new(sink), self.backfill_config())
            .with_shutdown(shutdown);
        let result = driver.run(job).await;

        match cli.output_format {
            OutputFormat::Json => output_json(self, &output, &result)?,
            OutputFormat::Human => output_human(self, &output, &result),
        }

        result.map(|_| ()).map_err(CliError::from)
    }
}

fn output_json(
    args: &DownloadArgs,
    output: &Path,
    result: &Result<BackfillReport, DownloadError>,
) -> Result<(), CliError> {
    let (success, report, err) = match result {
        Ok(report) => (true, Some(report), None),
        Err(e) => (false, None, Some(e.to_string())),
    };
    let value = serde_json::json!({
        "success": success,
        "symbol": args.symbol,
        "interval": args.interval.as_str(),
        "output_path": output.display().to_string(),
        "report": report,
        "error": err,
    });
    let line = serde_json::to_string(&value)
        .map_err(|e| CliError::InvalidArgument(format!("Failed to render output: {e}")))?;
    println!("{line}");
    Ok(())
}

fn output_human(args: &DownloadArgs, output: &Path, result: &Result<BackfillReport, DownloadError>) {
    match result {
        Ok(report) => {
            println!("\nDownload {}!", report.status);
            println!("Symbol: {} {}", args.symbol, args.interval);
            println!("Output: {}", output.display());
            println!("Records: {}", report.records);
            if let (Some(first), Some(last)) = (report.first_open_time, report.last_open_time) {
                println!(
                    "Range: {} to {}",
                    format_timestamp(first),
                    format_timestamp(last)
                );
            }
            println!("Requests: {}", report.total_requests);
            if report.cancelled {
                println!("Stopped by user; rerun to continue.");
            }
        }
        Err(e) => {
            eprintln!("\nDownload failed!");
            eprintln!("Error: {e}");
            error!("Download failed: {}", e);
        }
    }
}
