//! Binary smoke tests

use assert_cmd::Command;
use tempfile::TempDir;

fn binary() -> Command {
    Command::cargo_bin("kline-backfill").unwrap()
}

#[test]
fn test_help_lists_commands() {
    let output = binary().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("download"));
    assert!(stdout.contains("analyze"));
}

#[test]
fn test_invalid_interval_rejected() {
    binary()
        .args(["download", "--interval", "7m"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_resume_mode_rejected() {
    binary()
        .args(["download", "--resume", "maybe"])
        .assert()
        .failure();
}

#[test]
fn test_analyze_without_series_fails() {
    let dir = TempDir::new().unwrap();
    binary()
        .args(["analyze", "--symbol", "BNBUSDT", "--data-dir"])
        .arg(dir.path())
        .assert()
        .failure();
}
