//! End-to-end analysis over a series file

use kline_backfill::analysis::{run_analysis, AnalysisError, FrequencyEntry, PriceChange};
use kline_backfill::output::path::prices_path;
use kline_backfill::output::{CheckpointSink, JsonCheckpointWriter};
use kline_backfill::{Candle, Interval};
use rust_decimal::Decimal;
use std::str::FromStr;
use tempfile::TempDir;

const MINUTE: i64 = 60_000;
const T0: i64 = 1_509_926_400_000;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn write_series(dir: &TempDir, closes: &[&str]) {
    let candles: Vec<Candle> = closes
        .iter()
        .enumerate()
        .map(|(i, close)| Candle::new(T0 + i as i64 * MINUTE, dec(close)))
        .collect();
    let path = prices_path(dir.path(), "BNBUSDT", Interval::OneMinute, false);
    JsonCheckpointWriter::new(path)
        .write_checkpoint(&candles)
        .unwrap();
}

#[test]
fn test_analysis_writes_all_results() {
    let dir = TempDir::new().unwrap();
    write_series(&dir, &["100", "101", "100", "101", "101"]);

    let summary = run_analysis(dir.path(), "BNBUSDT", Interval::OneMinute, false).unwrap();

    assert_eq!(summary.records, 5);
    assert_eq!(summary.changes, 4);
    assert_eq!(summary.unique, 3);

    let changes: Vec<PriceChange> =
        serde_json::from_slice(&std::fs::read(&summary.paths.changes).unwrap()).unwrap();
    assert_eq!(changes[0], PriceChange(T0 + MINUTE, dec("1")));
    assert_eq!(changes[3], PriceChange(T0 + 4 * MINUTE, dec("0")));

    let frequencies: Vec<FrequencyEntry> =
        serde_json::from_slice(&std::fs::read(&summary.paths.frequency_full).unwrap()).unwrap();
    assert_eq!(frequencies[0], FrequencyEntry(dec("1"), 2));
    assert_eq!(frequencies.iter().map(|f| f.1).sum::<u64>(), 4);

    let report = std::fs::read_to_string(&summary.paths.report).unwrap();
    assert!(report.starts_with("Analysis for BNBUSDT (interval: 1m)"));
    assert!(report.contains("Total changes: 4"));
    assert!(report.ends_with("Unique values: 3"));

    assert!(summary.preview.ends_with(&format!(
        "Full report saved to {}",
        summary.paths.report.display()
    )));
}

#[test]
fn test_changes_file_uses_plain_numbers() {
    let dir = TempDir::new().unwrap();
    write_series(&dir, &["4", "5"]);

    let summary = run_analysis(dir.path(), "BNBUSDT", Interval::OneMinute, false).unwrap();

    let text = std::fs::read_to_string(&summary.paths.changes).unwrap();
    assert_eq!(text, format!("[[{},25.0]]", T0 + MINUTE));
}

#[test]
fn test_missing_series_is_reported() {
    let dir = TempDir::new().unwrap();

    let err = run_analysis(dir.path(), "ETHUSDT", Interval::OneHour, false).unwrap_err();

    match err {
        AnalysisError::MissingData { path, symbol, interval } => {
            assert!(path.ends_with("ethusdt_1h_prices.json"));
            assert_eq!(symbol, "ETHUSDT");
            assert_eq!(interval, Interval::OneHour);
        }
        other => panic!("expected missing data, got {other:?}"),
    }
}
