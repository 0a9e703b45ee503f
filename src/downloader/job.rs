//! Backfill job, loop state and report

use crate::{find_gaps, Candle, Interval};
use serde::Serialize;
use tracing::warn;

/// What to download
#[derive(Debug, Clone)]
pub struct BackfillJob {
    /// Trading symbol (e.g., "BNBUSDT")
    pub symbol: String,
    /// Candle interval
    pub interval: Interval,
    /// Requested start (Unix milliseconds)
    pub start_time: i64,
    /// End of the range; `None` means "now" when the run starts
    pub end_time: Option<i64>,
    /// Previously downloaded series to continue from
    pub existing: Vec<Candle>,
}

impl BackfillJob {
    /// Job from `start_time` up to the time the run starts
    pub fn new(symbol: impl Into<String>, interval: Interval, start_time: i64) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            start_time,
            end_time: None,
            existing: Vec::new(),
        }
    }

    /// Fix the end of the range
    pub fn with_end_time(mut self, end_time: i64) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Continue from an existing series
    pub fn with_existing(mut self, existing: Vec<Candle>) -> Self {
        self.existing = existing;
        self
    }

    /// Validate job parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.trim().is_empty() {
            return Err("Symbol cannot be empty".to_string());
        }
        if self.start_time < 0 {
            return Err(format!("Start time ({}) must not be negative", self.start_time));
        }
        Ok(())
    }
}

/// Driver state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverState {
    /// Issuing windows
    Running,
    /// Cooling down after a window failed
    WaitingAfterError,
    /// Loop finished: end time reached or shutdown requested
    Done,
    /// Stopped early by the empty-window ceiling or the failure policy
    Aborted,
}

/// How far the run got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    /// Cursor reached the end time
    Completed,
    /// Run stopped before the end time
    Incomplete,
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionStatus::Completed => f.write_str("completed"),
            CompletionStatus::Incomplete => f.write_str("incomplete"),
        }
    }
}

/// Mutable loop state owned by the driver for one run
#[derive(Debug, Clone)]
pub struct BackfillState {
    /// Next open time to request
    pub cursor: i64,
    /// Everything downloaded so far, strictly increasing by open time
    pub buffer: Vec<Candle>,
    /// Empty windows seen in a row
    pub consecutive_empty: u32,
    /// Non-empty results so far
    pub request_count: u64,
    /// Failures of the current window in a row
    pub window_failures: u32,
}

impl BackfillState {
    /// State starting at `cursor` with `buffer` preloaded
    pub fn new(cursor: i64, buffer: Vec<Candle>) -> Self {
        Self {
            cursor,
            buffer,
            consecutive_empty: 0,
            request_count: 0,
            window_failures: 0,
        }
    }

    /// Append a batch, skipping candles before the cursor.
    ///
    /// Gaps against the buffer tail and inside the batch are logged, not
    /// filled. Returns the number of candles appended.
    pub fn append(&mut self, batch: Vec<Candle>, interval_ms: i64) -> usize {
        let cursor = self.cursor;
        let mut fresh: Vec<Candle> = batch.into_iter().filter(|c| c.open_time >= cursor).collect();
        fresh.sort_by_key(|c| c.open_time);
        fresh.dedup_by_key(|c| c.open_time);
        if let (Some(tail), Some(head)) = (self.buffer.last(), fresh.first()) {
            if head.open_time <= tail.open_time {
                let tail_time = tail.open_time;
                fresh.retain(|c| c.open_time > tail_time);
            }
        }

        let boundary = self.buffer.last().copied();
        let checked: Vec<Candle> = boundary.into_iter().chain(fresh.iter().copied()).collect();
        for gap in find_gaps(&checked, interval_ms) {
            warn!(
                expected = gap.expected,
                found = gap.found,
                missing = gap.missing(interval_ms),
                "Gap in series"
            );
        }

        let appended = fresh.len();
        self.buffer.extend(fresh);
        appended
    }

    /// Move the cursor after a non-empty batch ending at `window_end`.
    ///
    /// The cursor always strictly increases.
    pub fn advance(&mut self, interval_ms: i64, window_end: i64) {
        let next = self
            .buffer
            .last()
            .map(|c| c.open_time + interval_ms)
            .unwrap_or(window_end + 1);
        self.cursor = if next > self.cursor { next } else { window_end + 1 };
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
    /// Final driver state (`Done` or `Aborted`)
    pub state: DriverState,
    /// Whether the cursor reached the end time
    pub status: CompletionStatus,
    /// Run stopped by a shutdown request
    pub cancelled: bool,
    /// Final cursor
    pub cursor: i64,
    /// End of the requested range
    pub end_time: i64,
    /// Non-empty results received
    pub total_requests: u64,
    /// Candles in the written series
    pub records: usize,
    /// Open time of the first candle
    pub first_open_time: Option<i64>,
    /// Open time of the last candle
    pub last_open_time: Option<i64>,
}
