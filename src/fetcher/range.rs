//! Range fetcher and first-trading-date probe over the klines endpoint

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::downloader::config::EARLIEST_PROBE_MS;
use crate::fetcher::binance_http::BinanceHttpClient;
use crate::fetcher::binance_parser::BinanceParser;
use crate::fetcher::{ClientConfig, FetcherResult, KlineSource};
use crate::{Candle, FetchWindow, Interval};

/// One bounded klines request per call, retried per [`ClientConfig`].
pub struct RangeFetcher {
    http: BinanceHttpClient,
}

impl RangeFetcher {
    /// Create a fetcher from configuration
    pub fn new(config: ClientConfig) -> FetcherResult<Self> {
        Ok(Self {
            http: BinanceHttpClient::new(config)?,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        self.http.config()
    }

    /// Fetch up to `limit` candles in `window`
    pub async fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        window: FetchWindow,
        limit: u32,
    ) -> FetcherResult<Vec<Candle>> {
        let params = [
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("startTime", window.start_time.to_string()),
            ("endTime", window.end_time.to_string()),
            ("limit", limit.to_string()),
        ];

        let candles = self
            .http
            .get(&params, symbol, window, BinanceParser::parse_klines)
            .await?;
        debug!(received = candles.len(), "Received klines");
        Ok(candles)
    }

    /// Open time of the very first candle for `symbol`/`interval`.
    pub async fn probe_first_trade(&self, symbol: &str, interval: Interval) -> Option<i64> {
        let window = FetchWindow::new(EARLIEST_PROBE_MS, Utc::now().timestamp_millis());
        match self.fetch(symbol, interval, window, 1).await {
            Ok(candles) => match candles.first() {
                Some(first) => {
                    info!(
                        symbol = %symbol,
                        interval = %interval,
                        first_open_time = first.open_time,
                        "Discovered first trading timestamp"
                    );
                    Some(first.open_time)
                }
                None => {
                    warn!(symbol = %symbol, interval = %interval, "Probe returned no candles");
                    None
                }
            },
            Err(e) => {
                warn!(symbol = %symbol, interval = %interval, error = %e, "First trading date probe failed");
                None
            }
        }
    }
}

#[async_trait]
impl KlineSource for RangeFetcher {
    async fn fetch_range(
        &self,
        symbol: &str,
        interval: Interval,
        window: FetchWindow,
    ) -> FetcherResult<Vec<Candle>> {
        self.fetch(symbol, interval, window, self.config().limit).await
    }

    fn limit(&self) -> u32 {
        self.config().limit
    }

    async fn first_open_time(&self, symbol: &str, interval: Interval) -> Option<i64> {
        self.probe_first_trade(symbol, interval).await
    }
}
