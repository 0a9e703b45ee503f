//! Price-change analysis over a downloaded series
//!
//! Reads `{symbol}_{interval}_prices.json`, writes the per-pair changes, the
//! full frequency table and a text report next to it.

use crate::output::json::write_atomic;
use crate::output::path::{prices_path, AnalysisPaths};
use crate::output::{load_series, OutputError};
use crate::Interval;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod changes;
pub mod frequency;

pub use changes::{compute_changes, percent_change, PriceChange};
pub use frequency::{FrequencyAnalysis, FrequencyEntry};

/// Analysis errors
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Series file does not exist
    #[error("file {path} not found; download {symbol} {interval} data first")]
    MissingData {
        /// Expected series file
        path: PathBuf,
        /// Requested symbol
        symbol: String,
        /// Requested interval
        interval: Interval,
    },

    /// Reading the series or writing results failed
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// What an analysis run produced
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    /// Files written
    pub paths: AnalysisPaths,
    /// Candles read
    pub records: usize,
    /// Changes computed
    pub changes: usize,
    /// Distinct change values
    pub unique: usize,
    /// First report lines followed by a pointer to the full report
    pub preview: String,
}

/// Run the full analysis for `symbol`/`interval` in `data_dir`.
///
/// `show_progress` controls the progress bar while computing changes.
pub fn run_analysis(
    data_dir: &Path,
    symbol: &str,
    interval: Interval,
    show_progress: bool,
) -> Result<AnalysisSummary, AnalysisError> {
    let input = prices_path(data_dir, symbol, interval, false);
    if !input.exists() {
        return Err(AnalysisError::MissingData {
            path: input,
            symbol: symbol.to_string(),
            interval,
        });
    }

    let mut candles = load_series(&input)?;
    info!(records = candles.len(), path = %input.display(), "Loaded series");

    let progress = if show_progress {
        progress_bar()
    } else {
        ProgressBar::hidden()
    };
    let changes = compute_changes(&mut candles, &progress);

    let paths = AnalysisPaths::new(data_dir, symbol, interval);
    write_json(&paths.changes, &changes)?;
    info!(path = %paths.changes.display(), "Price changes saved");

    let analysis = FrequencyAnalysis::analyze(&changes);
    write_json(&paths.frequency_full, &analysis.frequencies)?;

    let report = analysis.report_lines(symbol, interval.as_str());
    write_atomic(&paths.report, report.join("\n").as_bytes())?;
    info!(path = %paths.report.display(), "Frequency report saved");

    let mut preview: Vec<String> = report
        .iter()
        .take(frequency::CONSOLE_PREVIEW_LINES)
        .cloned()
        .collect();
    preview.push("...".to_string());
    preview.push(format!("Full report saved to {}", paths.report.display()));

    Ok(AnalysisSummary {
        records: candles.len(),
        changes: changes.len(),
        unique: analysis.unique(),
        preview: preview.join("\n"),
        paths,
    })
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), OutputError> {
    let bytes =
        serde_json::to_vec(value).map_err(|e| OutputError::SerializationError(e.to_string()))?;
    write_atomic(path, &bytes)
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message("Computing price changes");
    pb
}
