//! Range fetcher against a local scripted HTTP server

use crate::support::mock_server::{MockResponse, MockServer};
use crate::support::{klines_body, minute_candles};
use kline_backfill::fetcher::{ClientConfig, FetcherError, KlineSource, RangeFetcher};
use kline_backfill::{FetchWindow, Interval};
use std::time::{Duration, Instant};

const T0: i64 = 1_509_926_400_000;

fn fetcher(base_url: String) -> RangeFetcher {
    let config = ClientConfig::default()
        .with_base_url(base_url)
        .with_backoff_base(Duration::from_millis(50))
        .with_request_timeout(Duration::from_secs(5));
    RangeFetcher::new(config).unwrap()
}

fn window() -> FetchWindow {
    FetchWindow::new(T0, T0 + 1000 * 60_000 - 1)
}

#[tokio::test]
async fn test_returns_candles_in_window() {
    let candles = minute_candles(T0, 3);
    let server = MockServer::start(vec![MockResponse::ok(klines_body(&candles))]).await;

    let result = fetcher(server.base_url())
        .fetch_range("BNBUSDT", Interval::OneMinute, window())
        .await
        .unwrap();

    assert_eq!(result, candles);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_request_carries_window_parameters() {
    let server = MockServer::start(vec![MockResponse::ok("[]")]).await;

    fetcher(server.base_url())
        .fetch_range("BNBUSDT", Interval::OneMinute, window())
        .await
        .unwrap();

    let line = &server.request_lines()[0];
    assert!(line.starts_with("GET /api/v3/klines?"), "{line}");
    assert!(line.contains("symbol=BNBUSDT"));
    assert!(line.contains("interval=1m"));
    assert!(line.contains(&format!("startTime={T0}")));
    assert!(line.contains(&format!("endTime={}", T0 + 1000 * 60_000 - 1)));
    assert!(line.contains("limit=1000"));
}

#[tokio::test]
async fn test_rate_limit_backs_off_then_succeeds() {
    let candles = minute_candles(T0, 2);
    let server = MockServer::start(vec![
        MockResponse::new(429, r#"{"code":-1003,"msg":"Too many requests"}"#),
        MockResponse::new(429, r#"{"code":-1003,"msg":"Too many requests"}"#),
        MockResponse::ok(klines_body(&candles)),
    ])
    .await;

    let started = Instant::now();
    let result = fetcher(server.base_url())
        .fetch_range("BNBUSDT", Interval::OneMinute, window())
        .await
        .unwrap();

    // 50ms + 100ms of backoff
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(result, candles);
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start(vec![
        MockResponse::new(503, "unavailable"),
        MockResponse::ok("[]"),
    ])
    .await;

    let result = fetcher(server.base_url())
        .fetch_range("BNBUSDT", Interval::OneMinute, window())
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_client_error_fails_without_retry() {
    let body = r#"{"code":-1121,"msg":"Invalid symbol."}"#;
    let server = MockServer::start(vec![MockResponse::new(400, body)]).await;

    let result = fetcher(server.base_url())
        .fetch_range("NOPE", Interval::OneMinute, window())
        .await;

    match result {
        Err(FetcherError::ClientError { status, body: returned }) => {
            assert_eq!(status, 400);
            assert_eq!(returned, body);
        }
        other => panic!("expected client error, got {other:?}"),
    }
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_retries_exhausted_after_max_attempts() {
    let server = MockServer::start(vec![MockResponse::new(500, "boom")]).await;
    let config = ClientConfig::default()
        .with_base_url(server.base_url())
        .with_backoff_base(Duration::from_millis(10))
        .with_max_retries(3);
    let fetcher = RangeFetcher::new(config).unwrap();

    let result = fetcher
        .fetch_range("BNBUSDT", Interval::OneMinute, window())
        .await;

    match result {
        Err(FetcherError::RetriesExhausted { attempts, last_error }) => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("500"), "{last_error}");
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    // Bind and release a port so nothing listens on it
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::default()
        .with_base_url(format!("http://{addr}"))
        .with_backoff_base(Duration::from_millis(10))
        .with_max_retries(2);
    let result = RangeFetcher::new(config)
        .unwrap()
        .fetch_range("BNBUSDT", Interval::OneMinute, window())
        .await;

    assert!(matches!(
        result,
        Err(FetcherError::RetriesExhausted { attempts: 2, .. })
    ));
}

#[tokio::test]
async fn test_blank_body_is_empty_window() {
    let server = MockServer::start(vec![MockResponse::ok("")]).await;

    let result = fetcher(server.base_url())
        .fetch_range("BNBUSDT", Interval::OneMinute, window())
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_malformed_success_body_is_retried() {
    let candles = minute_candles(T0, 1);
    let server = MockServer::start(vec![
        MockResponse::ok("<html>maintenance</html>"),
        MockResponse::ok(klines_body(&candles)),
    ])
    .await;

    let result = fetcher(server.base_url())
        .fetch_range("BNBUSDT", Interval::OneMinute, window())
        .await
        .unwrap();

    assert_eq!(result, candles);
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_probe_returns_first_open_time() {
    let server = MockServer::start(vec![MockResponse::ok(klines_body(&minute_candles(T0, 1)))]).await;

    let first = fetcher(server.base_url())
        .first_open_time("BNBUSDT", Interval::OneMinute)
        .await;

    assert_eq!(first, Some(T0));
    let line = &server.request_lines()[0];
    assert!(line.contains("startTime=1262304000000"), "{line}");
    assert!(line.contains("limit=1 "), "{line}");
}

#[tokio::test]
async fn test_probe_unknown_on_empty_or_error() {
    let server = MockServer::start(vec![MockResponse::ok("[]")]).await;
    assert_eq!(
        fetcher(server.base_url())
            .first_open_time("BNBUSDT", Interval::OneMinute)
            .await,
        None
    );

    let server = MockServer::start(vec![MockResponse::new(400, "bad symbol")]).await;
    assert_eq!(
        fetcher(server.base_url())
            .first_open_time("NOPE", Interval::OneMinute)
            .await,
        None
    );
}

#[tokio::test]
async fn test_reported_limit_matches_request() {
    let server = MockServer::start(vec![MockResponse::ok("[]")]).await;
    let config = ClientConfig::default()
        .with_base_url(server.base_url())
        .with_limit(25);
    let fetcher = RangeFetcher::new(config).unwrap();

    assert_eq!(fetcher.limit(), 25);
    fetcher
        .fetch_range("BNBUSDT", Interval::OneMinute, FetchWindow::new(T0, T0 + 25 * 60_000 - 1))
        .await
        .unwrap();

    let line = &server.request_lines()[0];
    assert!(line.contains("limit=25 "), "{line}");
}
