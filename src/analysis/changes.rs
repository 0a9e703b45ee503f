//! Percentage changes between consecutive candles

use crate::fetcher::retry_formatter::format_timestamp;
use crate::Candle;
use indicatif::ProgressBar;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Decimal places kept for each change
pub const CHANGE_DECIMALS: u32 = 10;

/// Log a progress line every this many pairs
const PROGRESS_LOG_EVERY: usize = 100_000;

/// Change from the previous close to this candle's close, in percent.
///
/// Serialized as `[open_time_ms, change]` with the change as a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChange(
    /// Open time of the later candle
    pub i64,
    /// Percentage change, rounded to [`CHANGE_DECIMALS`] places
    #[serde(with = "rust_decimal::serde::float")]
    pub Decimal,
);

impl PriceChange {
    /// Open time of the later candle
    pub fn open_time(&self) -> i64 {
        self.0
    }

    /// Percentage change
    pub fn change(&self) -> Decimal {
        self.1
    }
}

/// `(p2 - p1) / p1 * 100`, rounded half-to-even; `None` when `p1` is zero.
pub fn percent_change(previous: Decimal, current: Decimal) -> Option<Decimal> {
    let ratio = (current - previous).checked_div(previous)?;
    let percent = ratio.checked_mul(Decimal::ONE_HUNDRED)?;
    Some(percent.round_dp(CHANGE_DECIMALS))
}

/// Sort `candles` by open time and derive one change per consecutive pair.
///
/// Pairs whose earlier close is zero are skipped with a warning.
pub fn compute_changes(candles: &mut [Candle], progress: &ProgressBar) -> Vec<PriceChange> {
    candles.sort_by_key(|c| c.open_time);
    let total = candles.len().saturating_sub(1);
    progress.set_length(total as u64);

    let mut changes = Vec::with_capacity(total);
    for (i, pair) in candles.windows(2).enumerate() {
        let (previous, current) = (pair[0], pair[1]);
        match percent_change(previous.close_price, current.close_price) {
            Some(change) => changes.push(PriceChange(current.open_time, change)),
            None => warn!(
                open_time = current.open_time,
                "Previous close is zero, skipping pair"
            ),
        }

        let processed = i + 1;
        if processed % PROGRESS_LOG_EVERY == 0 {
            info!(
                processed,
                total,
                current = %format_timestamp(current.open_time),
                "Computing price changes"
            );
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    changes
}
