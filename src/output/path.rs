//! Output file naming
//!
//! Series files live flat in a data directory:
//! - `{symbol}_{interval}_prices.json` for downloads
//! - `{symbol}_minute_prices.json` with the legacy minute naming
//! - `price_changes_{symbol}_{interval}.json` and the frequency analysis files
//!
//! Symbols are lowercased and sanitized so they cannot escape the directory.

use crate::Interval;
use std::path::{Path, PathBuf};

/// Lowercase `symbol`, replacing path separators and `..` with `_`
pub fn sanitize_symbol(symbol: &str) -> String {
    symbol
        .replace("..", "_")
        .replace(['/', '\\', ':'], "_")
        .to_lowercase()
}

/// `{symbol}_{interval}_prices.json`
pub fn prices_file_name(symbol: &str, interval: Interval) -> String {
    format!("{}_{}_prices.json", sanitize_symbol(symbol), interval)
}

/// `{symbol}_minute_prices.json`
pub fn minute_prices_file_name(symbol: &str) -> String {
    format!("{}_minute_prices.json", sanitize_symbol(symbol))
}

/// Download destination in `dir`
pub fn prices_path(dir: &Path, symbol: &str, interval: Interval, minute_naming: bool) -> PathBuf {
    if minute_naming && interval == Interval::OneMinute {
        dir.join(minute_prices_file_name(symbol))
    } else {
        dir.join(prices_file_name(symbol, interval))
    }
}

/// Files produced by `analyze` for one symbol/interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPaths {
    /// Per-pair percentage changes
    pub changes: PathBuf,
    /// Full frequency table
    pub frequency_full: PathBuf,
    /// Human-readable report
    pub report: PathBuf,
}

impl AnalysisPaths {
    /// Paths under `dir`
    pub fn new(dir: &Path, symbol: &str, interval: Interval) -> Self {
        let suffix = format!("{}_{}", sanitize_symbol(symbol), interval);
        Self {
            changes: dir.join(format!("price_changes_{suffix}.json")),
            frequency_full: dir.join(format!("frequency_analysis_full_{suffix}.json")),
            report: dir.join(format!("frequency_analysis_report_{suffix}.txt")),
        }
    }
}

/// Advisory lock file next to `path` (`<file>.lock`)
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}
