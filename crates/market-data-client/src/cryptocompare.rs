//! CryptoCompare min-api: full quotes (cap, supply, 24h stats) and OHLCV history.
//!
//! There is no free capitalization history, so historical caps are derived
//! from minute closes times the current circulating supply.

use async_trait::async_trait;
use chrono::DateTime;
use liquidity_core::{
    CandleInterval, CapSample, Candle, GlobalTotals, MarketDataError, MarketDataSource, TickerStats,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::http::{JsonFetcher, RetryPolicy};

pub const CRYPTOCOMPARE_BASE_URL: &str = "https://min-api.cryptocompare.com";

const PROVIDER: &str = "cryptocompare";
const RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(10));
const MAX_HISTO_LIMIT: u32 = 2000;

/// Quote currencies recognised when splitting an exchange pair, longest first
const QUOTE_ASSETS: &[&str] = &["FDUSD", "USDT", "USDC", "BUSD", "USD", "EUR", "BTC", "ETH"];

#[derive(Clone)]
pub struct CryptoCompareClient {
    http: JsonFetcher,
}

impl Default for CryptoCompareClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoCompareClient {
    pub fn new() -> Self {
        Self::with_base_url(CRYPTOCOMPARE_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: JsonFetcher::new(PROVIDER, base_url, RETRY),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.http = self
            .http
            .with_header("authorization", format!("Apikey {}", api_key.into()));
        self
    }

    async fn quotes(
        &self,
        fsyms: &[String],
        tsym: &str,
    ) -> Result<HashMap<String, RawQuote>, MarketDataError> {
        let response: PriceMultiFullResponse = self
            .http
            .get_json(
                "/data/pricemultifull",
                &[("fsyms", fsyms.join(",")), ("tsyms", tsym.to_string())],
            )
            .await?;

        Ok(response
            .raw
            .into_iter()
            .filter_map(|(fsym, mut by_quote)| by_quote.remove(tsym).map(|q| (fsym, q)))
            .collect())
    }

    async fn histo(
        &self,
        endpoint: HistoEndpoint,
        fsym: &str,
        tsym: &str,
        limit: u32,
    ) -> Result<Vec<HistoBar>, MarketDataError> {
        let response: HistoResponse = self
            .http
            .get_json(
                endpoint.path,
                &[
                    ("fsym", fsym.to_string()),
                    ("tsym", tsym.to_string()),
                    ("limit", limit.clamp(1, MAX_HISTO_LIMIT).to_string()),
                    ("aggregate", endpoint.aggregate.to_string()),
                ],
            )
            .await?;

        parse_histo(fsym, response)
    }
}

#[async_trait]
impl MarketDataSource for CryptoCompareClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_global(&self) -> Result<GlobalTotals, MarketDataError> {
        Err(MarketDataError::unsupported(PROVIDER, "global market totals"))
    }

    async fn fetch_caps(&self, ids: &[String]) -> Result<HashMap<String, f64>, MarketDataError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let symbols: Vec<String> = ids.iter().map(|id| asset_symbol(id)).collect();
        let quotes = self.quotes(&symbols, "USD").await?;

        Ok(ids
            .iter()
            .zip(&symbols)
            .filter_map(|(id, symbol)| {
                let cap = quotes.get(symbol)?.market_cap.filter(|c| c.is_finite())?;
                Some((id.clone(), cap))
            })
            .collect())
    }

    async fn fetch_history(
        &self,
        asset_id: &str,
        lookback_minutes: u32,
    ) -> Result<Vec<CapSample>, MarketDataError> {
        let symbol = asset_symbol(asset_id);
        let quotes = self.quotes(std::slice::from_ref(&symbol), "USD").await?;
        let supply = quotes
            .get(&symbol)
            .and_then(|q| q.supply)
            .filter(|s| s.is_finite() && *s > 0.0)
            .ok_or_else(|| {
                MarketDataError::DataUnavailable(format!(
                    "cryptocompare: no circulating supply for {}",
                    symbol
                ))
            })?;

        let (endpoint, limit) = history_request(lookback_minutes);
        let bars = self.histo(endpoint, &symbol, "USD", limit).await?;

        Ok(caps_from_closes(&bars, supply))
    }

    async fn fetch_ticker_24h(&self, symbol: &str) -> Result<TickerStats, MarketDataError> {
        let (base, quote) = split_pair(symbol);
        let quotes = self.quotes(std::slice::from_ref(&base), &quote).await?;
        let raw = quotes.get(&base).ok_or_else(|| {
            MarketDataError::DataUnavailable(format!(
                "cryptocompare: no quote for {}/{}",
                base, quote
            ))
        })?;

        Ok(TickerStats {
            symbol: symbol.to_uppercase(),
            last_price: raw.price,
            price_change_percent: raw.change_pct_24h,
            quote_volume: raw.volume_24h_to,
        })
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        interval: CandleInterval,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let (base, quote) = split_pair(symbol);
        let bars = self.histo(HistoEndpoint::for_interval(interval), &base, &quote, limit).await?;

        Ok(bars
            .into_iter()
            .filter(|b| b.close > 0.0)
            .filter_map(|b| {
                Some(Candle {
                    open_time: DateTime::from_timestamp(b.time, 0)?,
                    open: b.open,
                    high: b.high,
                    low: b.low,
                    close: b.close,
                    volume: b.volumefrom,
                })
            })
            .collect())
    }
}

/// Map CoinGecko-style asset ids to ticker symbols
pub fn asset_symbol(asset_id: &str) -> String {
    match asset_id {
        "bitcoin" => "BTC",
        "ethereum" => "ETH",
        "tether" => "USDT",
        "usd-coin" => "USDC",
        "dai" => "DAI",
        "true-usd" => "TUSD",
        "first-digital-usd" => "FDUSD",
        "paypal-usd" => "PYUSD",
        "ethena-usde" => "USDE",
        other => return other.to_uppercase(),
    }
    .to_string()
}

/// `BTCUSDT` -> (`BTC`, `USDT`); unknown quote assets default to USD
pub fn split_pair(symbol: &str) -> (String, String) {
    let symbol = symbol.to_uppercase();
    for quote in QUOTE_ASSETS {
        if let Some(base) = symbol.strip_suffix(quote) {
            if !base.is_empty() {
                return (base.to_string(), quote.to_string());
            }
        }
    }
    (symbol, "USD".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HistoEndpoint {
    path: &'static str,
    aggregate: u32,
}

impl HistoEndpoint {
    const MINUTE: &'static str = "/data/v2/histominute";
    const HOUR: &'static str = "/data/v2/histohour";
    const DAY: &'static str = "/data/v2/histoday";

    fn for_interval(interval: CandleInterval) -> Self {
        let (path, aggregate) = match interval {
            CandleInterval::Minute1 => (Self::MINUTE, 1),
            CandleInterval::Minute5 => (Self::MINUTE, 5),
            CandleInterval::Minute15 => (Self::MINUTE, 15),
            CandleInterval::Hour1 => (Self::HOUR, 1),
            CandleInterval::Hour4 => (Self::HOUR, 4),
            CandleInterval::Day1 => (Self::DAY, 1),
        };
        Self { path, aggregate }
    }
}

/// Minute bars while the lookback fits in one request, hourly beyond that
fn history_request(lookback_minutes: u32) -> (HistoEndpoint, u32) {
    if lookback_minutes + 5 <= MAX_HISTO_LIMIT {
        (HistoEndpoint::for_interval(CandleInterval::Minute1), lookback_minutes + 5)
    } else {
        (HistoEndpoint::for_interval(CandleInterval::Hour1), lookback_minutes / 60 + 2)
    }
}

fn parse_histo(fsym: &str, response: HistoResponse) -> Result<Vec<HistoBar>, MarketDataError> {
    if response.response.as_deref() == Some("Error") {
        return Err(MarketDataError::DataUnavailable(format!(
            "cryptocompare history for {}: {}",
            fsym, response.message
        )));
    }

    let bars = response.data.map(|d| d.data).unwrap_or_default();
    if bars.is_empty() {
        return Err(MarketDataError::DataUnavailable(format!(
            "cryptocompare history for {}: no bars",
            fsym
        )));
    }
    Ok(bars)
}

/// Zero-close bars are gaps with no trades and are dropped
fn caps_from_closes(bars: &[HistoBar], supply: f64) -> Vec<CapSample> {
    let mut samples: Vec<CapSample> = bars
        .iter()
        .filter(|b| b.close > 0.0)
        .filter_map(|b| {
            Some(CapSample {
                timestamp: DateTime::from_timestamp(b.time, 0)?,
                cap: b.close * supply,
            })
        })
        .collect();
    samples.sort_by_key(|s| s.timestamp);
    samples
}

// Response structures
#[derive(Debug, Deserialize)]
struct PriceMultiFullResponse {
    #[serde(rename = "RAW", default)]
    raw: HashMap<String, HashMap<String, RawQuote>>,
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(rename = "PRICE", default)]
    price: Option<f64>,
    #[serde(rename = "MKTCAP", default)]
    market_cap: Option<f64>,
    #[serde(rename = "SUPPLY", default)]
    supply: Option<f64>,
    #[serde(rename = "CHANGEPCT24HOUR", default)]
    change_pct_24h: Option<f64>,
    #[serde(rename = "VOLUME24HOURTO", default)]
    volume_24h_to: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HistoResponse {
    #[serde(rename = "Response", default)]
    response: Option<String>,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data", default)]
    data: Option<HistoData>,
}

#[derive(Debug, Deserialize)]
struct HistoData {
    #[serde(rename = "Data", default)]
    data: Vec<HistoBar>,
}

#[derive(Debug, Clone, Deserialize)]
struct HistoBar {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volumefrom: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pair() {
        assert_eq!(split_pair("BTCUSDT"), ("BTC".to_string(), "USDT".to_string()));
        assert_eq!(split_pair("ethfdusd"), ("ETH".to_string(), "FDUSD".to_string()));
        assert_eq!(split_pair("ETHBTC"), ("ETH".to_string(), "BTC".to_string()));
        assert_eq!(split_pair("SOL"), ("SOL".to_string(), "USD".to_string()));
    }

    #[test]
    fn test_asset_symbol_mapping() {
        assert_eq!(asset_symbol("usd-coin"), "USDC");
        assert_eq!(asset_symbol("solana"), "SOLANA");
    }

    #[test]
    fn test_parse_pricemultifull() {
        let body = r#"{
            "RAW": {
                "BTC": {"USD": {"PRICE": 61000.0, "MKTCAP": 1200000000000.0, "SUPPLY": 19650000.0,
                                "CHANGEPCT24HOUR": 2.5, "VOLUME24HOURTO": 1500000000.0}}
            },
            "DISPLAY": {}
        }"#;
        let response: PriceMultiFullResponse = serde_json::from_str(body).unwrap();
        let quote = &response.raw["BTC"]["USD"];
        assert_eq!(quote.market_cap, Some(1.2e12));
        assert_eq!(quote.supply, Some(19650000.0));
        assert_eq!(quote.change_pct_24h, Some(2.5));
    }

    #[test]
    fn test_parse_histo_and_derive_caps() {
        let body = r#"{
            "Response": "Success",
            "Message": "",
            "Data": {"Aggregated": false, "TimeFrom": 1709294400, "TimeTo": 1709294520, "Data": [
                {"time": 1709294460, "open": 10.0, "high": 11.0, "low": 9.5, "close": 10.5, "volumefrom": 3.0, "volumeto": 31.5},
                {"time": 1709294400, "open": 9.0, "high": 10.0, "low": 8.5, "close": 10.0, "volumefrom": 2.0, "volumeto": 20.0},
                {"time": 1709294520, "open": 0.0, "high": 0.0, "low": 0.0, "close": 0.0, "volumefrom": 0.0, "volumeto": 0.0}
            ]}
        }"#;
        let response: HistoResponse = serde_json::from_str(body).unwrap();
        let bars = parse_histo("BTC", response).unwrap();
        let caps = caps_from_closes(&bars, 100.0);

        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0].timestamp.timestamp(), 1709294400);
        assert_eq!(caps[0].cap, 1000.0);
        assert_eq!(caps[1].cap, 1050.0);
    }

    #[test]
    fn test_parse_histo_error_response() {
        let body = r#"{"Response": "Error", "Message": "fsym is a required param.", "Data": {}}"#;
        let response: HistoResponse = serde_json::from_str(body).unwrap();
        match parse_histo("BTC", response) {
            Err(MarketDataError::DataUnavailable(msg)) => assert!(msg.contains("required param")),
            other => panic!("expected DataUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_history_request_switches_to_hourly() {
        let (endpoint, limit) = history_request(60);
        assert_eq!(endpoint.path, HistoEndpoint::MINUTE);
        assert_eq!(limit, 65);

        let (endpoint, limit) = history_request(2880);
        assert_eq!(endpoint.path, HistoEndpoint::HOUR);
        assert_eq!(limit, 50);
    }
}
