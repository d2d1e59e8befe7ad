//! CoinGecko public API: global totals, batched caps and cap history.

use async_trait::async_trait;
use chrono::DateTime;
use liquidity_core::{
    CandleInterval, CapSample, Candle, GlobalTotals, MarketDataError, MarketDataSource, TickerStats,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::http::{JsonFetcher, RetryPolicy};

pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";

const PROVIDER: &str = "coingecko";
const RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_millis(800), Duration::from_secs(20));
/// Free tier allows roughly 30 calls per minute
pub const COINGECKO_DEFAULT_RATE_LIMIT: usize = 30;

#[derive(Clone)]
pub struct CoinGeckoClient {
    http: JsonFetcher,
}

impl Default for CoinGeckoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CoinGeckoClient {
    pub fn new() -> Self {
        Self::with_base_url(COINGECKO_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: JsonFetcher::new(PROVIDER, base_url, RETRY)
                .with_rate_limit(COINGECKO_DEFAULT_RATE_LIMIT, Duration::from_secs(60)),
        }
    }

    /// Demo-plan key, sent as `x-cg-demo-api-key`
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.http = self.http.with_header("x-cg-demo-api-key", api_key);
        self
    }

    pub fn with_rate_limit(mut self, requests_per_minute: usize) -> Self {
        self.http = self.http.with_rate_limit(requests_per_minute, Duration::from_secs(60));
        self
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_global(&self) -> Result<GlobalTotals, MarketDataError> {
        let response: GlobalResponse = self.http.get_json("/global", &[]).await?;
        parse_global(response)
    }

    async fn fetch_caps(&self, ids: &[String]) -> Result<HashMap<String, f64>, MarketDataError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let response: HashMap<String, SimplePriceEntry> = self
            .http
            .get_json(
                "/simple/price",
                &[
                    ("ids", ids.join(",")),
                    ("vs_currencies", "usd".to_string()),
                    ("include_market_cap", "true".to_string()),
                ],
            )
            .await?;

        Ok(parse_simple_caps(response))
    }

    async fn fetch_history(
        &self,
        asset_id: &str,
        lookback_minutes: u32,
    ) -> Result<Vec<CapSample>, MarketDataError> {
        let path = format!("/coins/{}/market_chart", asset_id);
        let response: MarketChartResponse = self
            .http
            .get_json(
                &path,
                &[
                    ("vs_currency", "usd".to_string()),
                    ("days", history_days(lookback_minutes).to_string()),
                ],
            )
            .await?;

        parse_market_chart(asset_id, response)
    }

    async fn fetch_ticker_24h(&self, _symbol: &str) -> Result<TickerStats, MarketDataError> {
        Err(MarketDataError::unsupported(PROVIDER, "exchange 24h tickers"))
    }

    async fn fetch_ohlcv(
        &self,
        _symbol: &str,
        _interval: CandleInterval,
        _limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError> {
        Err(MarketDataError::unsupported(PROVIDER, "OHLCV candles with volume"))
    }
}

/// Days of history to request so the series reaches past the cutoff.
/// Spans up to a day come back at 5-minute granularity.
fn history_days(lookback_minutes: u32) -> u32 {
    ((lookback_minutes + 60 + 1439) / 1440).max(1)
}

fn parse_global(response: GlobalResponse) -> Result<GlobalTotals, MarketDataError> {
    let total_cap = response
        .data
        .total_market_cap
        .get("usd")
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| {
            MarketDataError::DataUnavailable(
                "coingecko /global: total_market_cap.usd missing".to_string(),
            )
        })?;

    Ok(GlobalTotals {
        total_cap,
        btc_dominance: response.data.market_cap_percentage.get("btc").copied(),
        eth_dominance: response.data.market_cap_percentage.get("eth").copied(),
    })
}

fn parse_simple_caps(response: HashMap<String, SimplePriceEntry>) -> HashMap<String, f64> {
    response
        .into_iter()
        .filter_map(|(id, entry)| entry.usd_market_cap.map(|cap| (id, cap)))
        .collect()
}

fn parse_market_chart(
    asset_id: &str,
    response: MarketChartResponse,
) -> Result<Vec<CapSample>, MarketDataError> {
    let mut samples: Vec<CapSample> = response
        .market_caps
        .into_iter()
        .filter_map(|(ts, cap)| {
            let cap = cap.filter(|c| c.is_finite())?;
            let timestamp = DateTime::from_timestamp_millis(ts as i64)?;
            Some(CapSample { timestamp, cap })
        })
        .collect();

    if samples.is_empty() {
        return Err(MarketDataError::DataUnavailable(format!(
            "coingecko market_chart for {}: no market_caps samples",
            asset_id
        )));
    }

    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
}

// Response structures
#[derive(Debug, Deserialize)]
struct GlobalResponse {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    #[serde(default)]
    total_market_cap: HashMap<String, f64>,
    #[serde(default)]
    market_cap_percentage: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct SimplePriceEntry {
    #[serde(default)]
    usd_market_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    market_caps: Vec<(f64, Option<f64>)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global() {
        let body = r#"{
            "data": {
                "active_cryptocurrencies": 12000,
                "total_market_cap": {"usd": 2450000000000.0, "eur": 2250000000000.0},
                "market_cap_percentage": {"btc": 52.4, "eth": 16.1, "usdt": 4.2}
            }
        }"#;
        let response: GlobalResponse = serde_json::from_str(body).unwrap();
        let totals = parse_global(response).unwrap();

        assert_eq!(totals.total_cap, 2.45e12);
        assert_eq!(totals.btc_dominance, Some(52.4));
        assert_eq!(totals.eth_dominance, Some(16.1));
    }

    #[test]
    fn test_parse_global_without_usd_is_unavailable() {
        let body = r#"{"data": {"total_market_cap": {"eur": 1.0}}}"#;
        let response: GlobalResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(parse_global(response), Err(MarketDataError::DataUnavailable(_))));
    }

    #[test]
    fn test_parse_simple_caps_skips_entries_without_cap() {
        let body = r#"{
            "tether": {"usd": 1.0, "usd_market_cap": 110000000000.0},
            "dai": {"usd": 0.999},
            "usd-coin": {"usd": 1.0, "usd_market_cap": 33000000000.0}
        }"#;
        let response: HashMap<String, SimplePriceEntry> = serde_json::from_str(body).unwrap();
        let caps = parse_simple_caps(response);

        assert_eq!(caps.len(), 2);
        assert_eq!(caps.get("tether"), Some(&1.1e11));
        assert!(!caps.contains_key("dai"));
    }

    #[test]
    fn test_parse_market_chart_sorts_and_skips_nulls() {
        let body = r#"{
            "prices": [[1709294400000, 61000.0]],
            "market_caps": [
                [1709294520000, 1200000000000.0],
                [1709294400000, 1190000000000.0],
                [1709294460000, null]
            ],
            "total_volumes": []
        }"#;
        let response: MarketChartResponse = serde_json::from_str(body).unwrap();
        let samples = parse_market_chart("bitcoin", response).unwrap();

        assert_eq!(samples.len(), 2);
        assert!(samples[0].timestamp < samples[1].timestamp);
        assert_eq!(samples[0].cap, 1.19e12);
    }

    #[test]
    fn test_parse_market_chart_empty_is_unavailable() {
        let response: MarketChartResponse = serde_json::from_str(r#"{"market_caps": []}"#).unwrap();
        assert!(parse_market_chart("bitcoin", response).is_err());
    }

    #[test]
    fn test_history_days_covers_lookback() {
        assert_eq!(history_days(15), 1);
        assert_eq!(history_days(240), 1);
        assert_eq!(history_days(1440), 2);
    }
}
