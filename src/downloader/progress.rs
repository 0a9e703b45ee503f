//! Checkpoint progress reporting.
//!
//! Coverage is measured along the timeline: how much of the
//! `[initial cursor, end time]` span lies behind the last downloaded candle.

use crate::fetcher::retry_formatter::format_timestamp;
use crate::Candle;
use std::time::{Duration, Instant};

/// Progress of one run, refreshed at every checkpoint.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// When the run started
    pub start_time: Instant,
    /// Timeline being covered (initial cursor, end time)
    pub range: (i64, i64),
    /// Candles already present before the run (resume)
    pub initial_records: usize,
    /// Candles in the buffer
    pub records: usize,
    /// Non-empty results so far
    pub requests: u64,
    /// Open time of the first buffered candle
    pub first_open_time: Option<i64>,
    /// Open time of the last buffered candle
    pub last_open_time: Option<i64>,
}

impl ProgressState {
    /// Start tracking coverage of `range`
    pub fn new(range: (i64, i64), initial_records: usize) -> Self {
        Self {
            start_time: Instant::now(),
            range,
            initial_records,
            records: initial_records,
            requests: 0,
            first_open_time: None,
            last_open_time: None,
        }
    }

    /// Refresh from the current buffer
    pub fn update(&mut self, buffer: &[Candle], requests: u64) {
        self.records = buffer.len();
        self.requests = requests;
        self.first_open_time = buffer.first().map(|c| c.open_time);
        self.last_open_time = buffer.last().map(|c| c.open_time);
    }

    /// Covered share of the range, 0-100
    pub fn percentage(&self) -> Option<f64> {
        self.timeline_ratio().map(|ratio| ratio * 100.0)
    }

    /// Records downloaded per second during this run
    pub fn rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let downloaded = self.records.saturating_sub(self.initial_records);
        if elapsed > 0.0 {
            downloaded as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Remaining time extrapolated from timeline coverage
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let ratio = self.timeline_ratio()?;
        if ratio <= 0.0 || ratio >= 1.0 {
            return None;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let remaining = (elapsed / ratio - elapsed).max(0.0);
        Some(Duration::from_secs_f64(remaining))
    }

    /// Human-readable progress line
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!("[PROGRESS] {} records", self.records)];

        if let (Some(first), Some(last)) = (self.first_open_time, self.last_open_time) {
            parts.push(format!(
                "{} to {}",
                format_timestamp(first),
                format_timestamp(last)
            ));
        }

        if let Some(pct) = self.percentage() {
            parts.push(format!("- {pct:.1}% of range"));
        }

        parts.push(format!("- {} requests", self.requests));

        let rate = self.rate();
        if rate > 0.0 {
            parts.push(format!("at {rate:.0} records/sec"));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }

    fn timeline_ratio(&self) -> Option<f64> {
        let (start, end) = self.range;
        let position = self.last_open_time?;
        let span = (end - start) as f64;
        if span <= 0.0 {
            return None;
        }
        let completed = (position.clamp(start, end) - start) as f64;
        Some((completed / span).clamp(0.0, 1.0))
    }
}

/// `45s`, `12m`, `3.5h`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
