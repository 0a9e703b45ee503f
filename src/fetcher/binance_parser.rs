//! Klines response parser
//!
//! Stateless conversion of the klines JSON body into [`Candle`]s. Only open
//! time (index 0) and close price (index 4) are retained.

use crate::fetcher::{FetcherError, FetcherResult};
use crate::Candle;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Index of the open time inside a kline tuple
const OPEN_TIME_INDEX: usize = 0;

/// Index of the close price inside a kline tuple
const CLOSE_PRICE_INDEX: usize = 4;

/// Stateless parser for klines responses
pub struct BinanceParser;

impl BinanceParser {
    /// Parse a klines body into candles.
    ///
    /// # Format
    /// `[[open_time, open, high, low, close, volume, close_time, ...], ...]`
    ///
    /// # Errors
    /// Returns `FetcherError::ParseError` if the body is not an array of tuples or a
    /// field cannot be decoded.
    pub fn parse_klines(body: Value) -> FetcherResult<Vec<Candle>> {
        let klines = match body {
            Value::Array(klines) => klines,
            other => {
                return Err(FetcherError::ParseError(format!(
                    "Expected klines array, got {}",
                    json_kind(&other)
                )))
            }
        };

        klines.iter().map(Self::parse_kline).collect()
    }

    fn parse_kline(kline: &Value) -> FetcherResult<Candle> {
        let arr = kline
            .as_array()
            .ok_or_else(|| FetcherError::ParseError("Kline is not an array".to_string()))?;

        if arr.len() <= CLOSE_PRICE_INDEX {
            return Err(FetcherError::ParseError(format!(
                "Expected at least {} elements in kline, got {}",
                CLOSE_PRICE_INDEX + 1,
                arr.len()
            )));
        }

        let open_time = arr[OPEN_TIME_INDEX]
            .as_i64()
            .ok_or_else(|| FetcherError::ParseError("Invalid open_time".to_string()))?;
        let close_price = Self::parse_decimal(&arr[CLOSE_PRICE_INDEX], "close")?;

        Ok(Candle::new(open_time, close_price))
    }

    /// Decimal from a JSON string, or from a JSON number as a fallback
    fn parse_decimal(value: &Value, field_name: &str) -> FetcherResult<Decimal> {
        let parsed = match value {
            Value::String(s) => Decimal::from_str(s),
            Value::Number(n) => Decimal::from_str(&n.to_string()),
            _ => {
                return Err(FetcherError::ParseError(format!(
                    "{field_name} is not a string or number"
                )))
            }
        };

        parsed.map_err(|e| FetcherError::ParseError(format!("Failed to parse {field_name}: {e}")))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
