//! # Kline Backfill
//!
//! Incrementally downloads the historical close-price series of a trading symbol
//! from a rate-limited klines API, checkpointing as it goes, and derives
//! percentage-change statistics from the downloaded series.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kline_backfill::downloader::{BackfillConfig, BackfillDriver, BackfillJob};
//! use kline_backfill::fetcher::{ClientConfig, RangeFetcher};
//! use kline_backfill::output::json::JsonCheckpointWriter;
//! use kline_backfill::Interval;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = RangeFetcher::new(ClientConfig::default())?;
//! let sink = JsonCheckpointWriter::new("bnbusdt_1m_prices.json");
//! let mut driver = BackfillDriver::new(Arc::new(fetcher), Box::new(sink), BackfillConfig::default());
//!
//! let job = BackfillJob::new("BNBUSDT", Interval::OneMinute, 1509926400000);
//! let report = driver.run(job).await?;
//! println!("{} records, status {}", report.records, report.status);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - one bounded klines request per call, with status classification and
//!   exponential backoff; also the first-trading-date probe
//! - [`downloader`] - the backfill driver owning the cursor, buffer and checkpoints
//! - [`output`] - whole-file JSON checkpoint sink
//! - [`resume`] - restarting from an existing checkpoint file, single-writer lock
//! - [`analysis`] - percentage changes and frequency analysis over a complete series
//! - [`shutdown`] - cooperative cancellation

#![warn(missing_docs)]
#![warn(clippy::all)]

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Price-change derivation over downloaded series
pub mod analysis;

/// CLI command implementations
pub mod cli;

/// Backfill orchestration
pub mod downloader;

/// Klines fetching
pub mod fetcher;

/// Optional Prometheus metrics
pub mod metrics;

/// Checkpoint output
pub mod output;

/// Resume from existing checkpoints
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// A single point of the price series: candle open time and close price.
///
/// Serialized as a two-element JSON array `[open_time_ms, "close"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i64, Decimal)", into = "(i64, Decimal)")]
pub struct Candle {
    /// Open time (Unix timestamp in milliseconds)
    pub open_time: i64,
    /// Close price
    pub close_price: Decimal,
}

impl Candle {
    /// Create a candle from its open time and close price
    pub fn new(open_time: i64, close_price: Decimal) -> Self {
        Self {
            open_time,
            close_price,
        }
    }
}

impl From<(i64, Decimal)> for Candle {
    fn from((open_time, close_price): (i64, Decimal)) -> Self {
        Self::new(open_time, close_price)
    }
}

impl From<Candle> for (i64, Decimal) {
    fn from(candle: Candle) -> Self {
        (candle.open_time, candle.close_price)
    }
}

/// A hole in a series: `expected` was the next open time, `found` is what came instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesGap {
    /// Open time the series should have continued with
    pub expected: i64,
    /// Open time actually present
    pub found: i64,
}

impl SeriesGap {
    /// Number of missing candles
    pub fn missing(&self, interval_ms: i64) -> i64 {
        (self.found - self.expected) / interval_ms
    }
}

/// Find every place where consecutive open times are not exactly `interval_ms` apart.
///
/// Duplicates and out-of-order candles show up as gaps with `found <= expected - interval_ms`.
pub fn find_gaps(candles: &[Candle], interval_ms: i64) -> Vec<SeriesGap> {
    candles
        .windows(2)
        .filter_map(|pair| {
            let expected = pair[0].open_time + interval_ms;
            (pair[1].open_time != expected).then_some(SeriesGap {
                expected,
                found: pair[1].open_time,
            })
        })
        .collect()
}

/// A requested millisecond range, both ends inclusive as sent to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    /// Window start (Unix milliseconds)
    pub start_time: i64,
    /// Window end (Unix milliseconds)
    pub end_time: i64,
}

impl FetchWindow {
    /// Create a window from explicit bounds
    pub fn new(start_time: i64, end_time: i64) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    /// Next window starting at `cursor`: at most `limit` candles wide, clamped to `end_time`.
    pub fn next(cursor: i64, limit: u32, interval_ms: i64, end_time: i64) -> Self {
        let span_end = cursor.saturating_add(i64::from(limit) * interval_ms - 1);
        Self::new(cursor, span_end.min(end_time))
    }
}

/// Time interval for klines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// 1 minute
    #[serde(rename = "1m")]
    OneMinute,
    /// 3 minutes
    #[serde(rename = "3m")]
    ThreeMinutes,
    /// 5 minutes
    #[serde(rename = "5m")]
    FiveMinutes,
    /// 15 minutes
    #[serde(rename = "15m")]
    FifteenMinutes,
    /// 30 minutes
    #[serde(rename = "30m")]
    ThirtyMinutes,
    /// 1 hour
    #[serde(rename = "1h")]
    OneHour,
    /// 2 hours
    #[serde(rename = "2h")]
    TwoHours,
    /// 4 hours
    #[serde(rename = "4h")]
    FourHours,
    /// 6 hours
    #[serde(rename = "6h")]
    SixHours,
    /// 8 hours
    #[serde(rename = "8h")]
    EightHours,
    /// 12 hours
    #[serde(rename = "12h")]
    TwelveHours,
    /// 1 day
    #[serde(rename = "1d")]
    OneDay,
    /// 3 days
    #[serde(rename = "3d")]
    ThreeDays,
    /// 1 week
    #[serde(rename = "1w")]
    OneWeek,
    /// 1 month
    #[serde(rename = "1M")]
    OneMonth,
}

impl Interval {
    /// All supported intervals, shortest first
    pub const ALL: [Interval; 15] = [
        Interval::OneMinute,
        Interval::ThreeMinutes,
        Interval::FiveMinutes,
        Interval::FifteenMinutes,
        Interval::ThirtyMinutes,
        Interval::OneHour,
        Interval::TwoHours,
        Interval::FourHours,
        Interval::SixHours,
        Interval::EightHours,
        Interval::TwelveHours,
        Interval::OneDay,
        Interval::ThreeDays,
        Interval::OneWeek,
        Interval::OneMonth,
    ];

    /// Convert interval to milliseconds
    pub fn to_milliseconds(&self) -> i64 {
        match self {
            Interval::OneMinute => 60_000,
            Interval::ThreeMinutes => 180_000,
            Interval::FiveMinutes => 300_000,
            Interval::FifteenMinutes => 900_000,
            Interval::ThirtyMinutes => 1_800_000,
            Interval::OneHour => 3_600_000,
            Interval::TwoHours => 7_200_000,
            Interval::FourHours => 14_400_000,
            Interval::SixHours => 21_600_000,
            Interval::EightHours => 28_800_000,
            Interval::TwelveHours => 43_200_000,
            Interval::OneDay => 86_400_000,
            Interval::ThreeDays => 259_200_000,
            Interval::OneWeek => 604_800_000,
            Interval::OneMonth => 2_592_000_000, // Approximate: 30 days
        }
    }

    /// Wire name used by the klines API ("1m", "1h", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::ThreeMinutes => "3m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::TwoHours => "2h",
            Interval::FourHours => "4h",
            Interval::SixHours => "6h",
            Interval::EightHours => "8h",
            Interval::TwelveHours => "12h",
            Interval::OneDay => "1d",
            Interval::ThreeDays => "3d",
            Interval::OneWeek => "1w",
            Interval::OneMonth => "1M",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .iter()
            .copied()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| format!("Invalid interval: {s}"))
    }
}
