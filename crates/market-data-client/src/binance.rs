//! Binance spot REST API: 24h tickers and klines.

use async_trait::async_trait;
use chrono::DateTime;
use liquidity_core::{
    CandleInterval, CapSample, Candle, GlobalTotals, MarketDataError, MarketDataSource, TickerStats,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::http::{JsonFetcher, RetryPolicy};

pub const BINANCE_BASE_URL: &str = "https://api.binance.com";

const PROVIDER: &str = "binance";
const RETRY: RetryPolicy = RetryPolicy::new(2, Duration::from_millis(500), Duration::from_secs(10));
const MAX_KLINES: u32 = 1000;

#[derive(Clone)]
pub struct BinanceClient {
    http: JsonFetcher,
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceClient {
    pub fn new() -> Self {
        Self::with_base_url(BINANCE_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: JsonFetcher::new(PROVIDER, base_url, RETRY),
        }
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_global(&self) -> Result<GlobalTotals, MarketDataError> {
        Err(MarketDataError::unsupported(PROVIDER, "global market totals"))
    }

    async fn fetch_caps(&self, _ids: &[String]) -> Result<HashMap<String, f64>, MarketDataError> {
        Err(MarketDataError::unsupported(PROVIDER, "market capitalization"))
    }

    async fn fetch_history(
        &self,
        _asset_id: &str,
        _lookback_minutes: u32,
    ) -> Result<Vec<CapSample>, MarketDataError> {
        Err(MarketDataError::unsupported(PROVIDER, "market capitalization history"))
    }

    async fn fetch_ticker_24h(&self, symbol: &str) -> Result<TickerStats, MarketDataError> {
        let response: Ticker24hResponse = self
            .http
            .get_json("/api/v3/ticker/24hr", &[("symbol", symbol.to_uppercase())])
            .await?;

        Ok(parse_ticker(symbol, response))
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        interval: CandleInterval,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let rows: Vec<Vec<Value>> = self
            .http
            .get_json(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_uppercase()),
                    ("interval", interval.as_str().to_string()),
                    ("limit", limit.clamp(1, MAX_KLINES).to_string()),
                ],
            )
            .await?;

        parse_klines(symbol, &rows)
    }
}

fn parse_ticker(symbol: &str, response: Ticker24hResponse) -> TickerStats {
    TickerStats {
        symbol: response.symbol.unwrap_or_else(|| symbol.to_uppercase()),
        last_price: parse_decimal(response.last_price.as_deref()),
        price_change_percent: parse_decimal(response.price_change_percent.as_deref()),
        quote_volume: parse_decimal(response.quote_volume.as_deref()),
    }
}

fn parse_decimal(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.parse::<f64>().ok()).filter(|v| v.is_finite())
}

/// Kline rows are positional arrays:
/// `[open_time, open, high, low, close, volume, close_time, ...]`
/// with prices and volume encoded as strings.
fn parse_kline(row: &[Value]) -> Option<Candle> {
    let field = |i: usize| -> Option<f64> {
        match row.get(i)? {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    };

    Some(Candle {
        open_time: DateTime::from_timestamp_millis(row.first()?.as_i64()?)?,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}

fn parse_klines(symbol: &str, rows: &[Vec<Value>]) -> Result<Vec<Candle>, MarketDataError> {
    let candles: Vec<Candle> = rows.iter().filter_map(|row| parse_kline(row)).collect();

    if candles.len() < rows.len() {
        tracing::warn!(
            "binance klines for {}: skipped {} malformed rows",
            symbol,
            rows.len() - candles.len()
        );
    }

    if candles.is_empty() {
        return Err(MarketDataError::DataUnavailable(format!(
            "binance klines for {}: no candles",
            symbol
        )));
    }

    Ok(candles)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24hResponse {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    last_price: Option<String>,
    #[serde(default)]
    price_change_percent: Option<String>,
    #[serde(default)]
    quote_volume: Option<String>,
}
