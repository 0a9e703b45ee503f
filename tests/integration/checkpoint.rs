//! Checkpoint files on disk: atomic rewrite, resume and cancellation

use crate::support::minute_candles;
use crate::support::scripted_source::{Fallback, ScriptedSource, Step};
use kline_backfill::downloader::{BackfillConfig, BackfillDriver, BackfillJob, CompletionStatus};
use kline_backfill::output::path::prices_path;
use kline_backfill::output::{load_series, CheckpointSink, JsonCheckpointWriter, OutputError};
use kline_backfill::resume::{load_existing, CheckpointLock, ResumeMode};
use kline_backfill::shutdown::ShutdownCoordinator;
use kline_backfill::Interval;
use std::sync::Arc;
use tempfile::TempDir;

const MINUTE: i64 = 60_000;
const T0: i64 = 1_509_926_400_000;

#[test]
fn test_rewrite_with_same_series_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let path = prices_path(dir.path(), "BNBUSDT", Interval::OneMinute, false);
    let candles = minute_candles(T0, 50);
    let mut writer = JsonCheckpointWriter::new(&path);

    writer.write_checkpoint(&candles).unwrap();
    let first = std::fs::read(&path).unwrap();
    writer.write_checkpoint(&candles).unwrap();
    let second = std::fs::read(&path).unwrap();

    assert_eq!(first, second);
    assert_eq!(writer.writes(), 2);
    assert_eq!(load_series(&path).unwrap(), candles);
}

#[test]
fn test_file_format_is_pairs_of_time_and_close() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("series.json");
    let mut writer = JsonCheckpointWriter::new(&path);

    writer.write_checkpoint(&minute_candles(T0, 2)).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, format!(r#"[[{T0},"1"],[{},"2"]]"#, T0 + MINUTE));
}

#[test]
fn test_no_temp_files_left_behind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("series.json");
    let mut writer = JsonCheckpointWriter::new(&path);
    for n in 1..=3 {
        writer.write_checkpoint(&minute_candles(T0, n)).unwrap();
    }

    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_lock_held_for_whole_run() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("series.json");

    let mut first = CheckpointLock::open(&path).unwrap();
    let guard = first.try_hold().unwrap();

    let mut second = CheckpointLock::open(&path).unwrap();
    assert!(matches!(second.try_hold(), Err(OutputError::LockError(_))));

    drop(guard);
    assert!(second.try_hold().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_resumed_run_extends_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bnbusdt_1m_prices.json");
    let existing = minute_candles(T0, 100);
    JsonCheckpointWriter::new(&path)
        .write_checkpoint(&existing)
        .unwrap();

    let preloaded = load_existing(&path, ResumeMode::On).unwrap();
    assert_eq!(preloaded, existing);

    let source = ScriptedSource::new(vec![Step::Fill]);
    let mut driver = BackfillDriver::new(
        Arc::new(source.clone()),
        Box::new(JsonCheckpointWriter::new(&path)),
        BackfillConfig::default().with_probe(false),
    );
    let job = BackfillJob::new("BNBUSDT", Interval::OneMinute, T0)
        .with_end_time(T0 + 200 * MINUTE)
        .with_existing(preloaded);
    let report = driver.run(job).await.unwrap();

    assert_eq!(source.windows()[0].start_time, T0 + 100 * MINUTE);
    assert_eq!(report.status, CompletionStatus::Completed);
    let written = load_series(&path).unwrap();
    assert_eq!(written.len(), 201);
    assert_eq!(&written[..100], &existing[..]);
}

#[tokio::test(start_paused = true)]
async fn test_resume_off_starts_over() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("series.json");
    JsonCheckpointWriter::new(&path)
        .write_checkpoint(&minute_candles(T0, 10))
        .unwrap();

    let preloaded = load_existing(&path, ResumeMode::Off).unwrap();
    assert!(preloaded.is_empty());

    let source = ScriptedSource::new(vec![Step::Candles(minute_candles(T0, 3))]);
    let mut driver = BackfillDriver::new(
        Arc::new(source),
        Box::new(JsonCheckpointWriter::new(&path)),
        BackfillConfig::default().with_probe(false),
    );
    let job = BackfillJob::new("BNBUSDT", Interval::OneMinute, T0)
        .with_end_time(T0 + 3 * MINUTE)
        .with_existing(preloaded);
    driver.run(job).await.unwrap();

    assert_eq!(load_series(&path).unwrap(), minute_candles(T0, 3));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_leaves_readable_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("series.json");
    let shutdown = ShutdownCoordinator::shared();
    let source = ScriptedSource::new(vec![])
        .with_fallback(Fallback::Fill)
        .with_shutdown_after(3, shutdown.clone());

    let mut driver = BackfillDriver::new(
        Arc::new(source),
        Box::new(JsonCheckpointWriter::new(&path)),
        BackfillConfig::default().with_probe(false),
    )
    .with_shutdown(shutdown);
    let job = BackfillJob::new("BNBUSDT", Interval::OneMinute, T0)
        .with_end_time(T0 + 100 * 1000 * MINUTE);
    let report = driver.run(job).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.status, CompletionStatus::Incomplete);
    let written = load_series(&path).unwrap();
    assert_eq!(written.len(), 3000);
    assert_eq!(written.last().map(|c| c.open_time), report.last_open_time);

    // The next run picks up where this one stopped
    let resumed = load_existing(&path, ResumeMode::On).unwrap();
    assert_eq!(resumed.len(), 3000);
}
