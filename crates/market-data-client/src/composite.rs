use async_trait::async_trait;
use liquidity_core::{
    CandleInterval, CapSample, Candle, GlobalTotals, MarketDataError, MarketDataSource, TickerStats,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::{BinanceClient, CoinGeckoClient, CryptoCompareClient};

/// Selectable market-data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    CoinGecko,
    Binance,
    CryptoCompare,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::CoinGecko => "coingecko",
            SourceKind::Binance => "binance",
            SourceKind::CryptoCompare => "cryptocompare",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coingecko" => Ok(SourceKind::CoinGecko),
            "binance" => Ok(SourceKind::Binance),
            "cryptocompare" => Ok(SourceKind::CryptoCompare),
            other => Err(format!(
                "unknown data source '{other}' (expected coingecko, binance or cryptocompare)"
            )),
        }
    }
}

/// Per-provider connection settings; `None` keeps the public defaults
#[derive(Clone, Default)]
pub struct ProviderSettings {
    pub coingecko_base_url: Option<String>,
    pub coingecko_api_key: Option<String>,
    pub coingecko_rate_limit: Option<usize>,
    pub binance_base_url: Option<String>,
    pub cryptocompare_base_url: Option<String>,
    pub cryptocompare_api_key: Option<String>,
}

/// API keys print as `Some("<redacted>")`
impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderSettings")
            .field("coingecko_base_url", &self.coingecko_base_url)
            .field("coingecko_api_key", &redact(&self.coingecko_api_key))
            .field("coingecko_rate_limit", &self.coingecko_rate_limit)
            .field("binance_base_url", &self.binance_base_url)
            .field("cryptocompare_base_url", &self.cryptocompare_base_url)
            .field("cryptocompare_api_key", &redact(&self.cryptocompare_api_key))
            .finish()
    }
}

impl ProviderSettings {
    pub fn build(&self, kind: SourceKind) -> Arc<dyn MarketDataSource> {
        match kind {
            SourceKind::CoinGecko => {
                let mut client = match &self.coingecko_base_url {
                    Some(url) => CoinGeckoClient::with_base_url(url.clone()),
                    None => CoinGeckoClient::new(),
                };
                if let Some(key) = &self.coingecko_api_key {
                    client = client.with_api_key(key.clone());
                }
                if let Some(limit) = self.coingecko_rate_limit {
                    client = client.with_rate_limit(limit);
                }
                Arc::new(client)
            }
            SourceKind::Binance => Arc::new(match &self.binance_base_url {
                Some(url) => BinanceClient::with_base_url(url.clone()),
                None => BinanceClient::new(),
            }),
            SourceKind::CryptoCompare => {
                let mut client = match &self.cryptocompare_base_url {
                    Some(url) => CryptoCompareClient::with_base_url(url.clone()),
                    None => CryptoCompareClient::new(),
                };
                if let Some(key) = &self.cryptocompare_api_key {
                    client = client.with_api_key(key.clone());
                }
                Arc::new(client)
            }
        }
    }
}

/// Routes each capability to its own provider.
///
/// Capitalization data (global, caps, history) comes from one source,
/// 24h tickers and candles from others.
#[derive(Clone)]
pub struct CompositeSource {
    caps: Arc<dyn MarketDataSource>,
    tickers: Arc<dyn MarketDataSource>,
    candles: Arc<dyn MarketDataSource>,
}

impl CompositeSource {
    pub fn new(
        caps: Arc<dyn MarketDataSource>,
        tickers: Arc<dyn MarketDataSource>,
        candles: Arc<dyn MarketDataSource>,
    ) -> Self {
        Self { caps, tickers, candles }
    }

    /// Build providers by kind. A kind used for several capabilities is built
    /// once so its rate limiter is shared.
    pub fn from_kinds(
        caps: SourceKind,
        tickers: SourceKind,
        candles: SourceKind,
        settings: &ProviderSettings,
    ) -> Self {
        let mut built: HashMap<SourceKind, Arc<dyn MarketDataSource>> = HashMap::new();
        let mut get = |kind: SourceKind| {
            built
                .entry(kind)
                .or_insert_with(|| settings.build(kind))
                .clone()
        };

        Self {
            caps: get(caps),
            tickers: get(tickers),
            candles: get(candles),
        }
    }

    pub fn providers(&self) -> (&'static str, &'static str, &'static str) {
        (self.caps.name(), self.tickers.name(), self.candles.name())
    }
}

#[async_trait]
impl MarketDataSource for CompositeSource {
    fn name(&self) -> &'static str {
        "composite"
    }

    async fn fetch_global(&self) -> Result<GlobalTotals, MarketDataError> {
        self.caps.fetch_global().await
    }

    async fn fetch_caps(&self, ids: &[String]) -> Result<HashMap<String, f64>, MarketDataError> {
        self.caps.fetch_caps(ids).await
    }

    async fn fetch_history(
        &self,
        asset_id: &str,
        lookback_minutes: u32,
    ) -> Result<Vec<CapSample>, MarketDataError> {
        self.caps.fetch_history(asset_id, lookback_minutes).await
    }

    async fn fetch_ticker_24h(&self, symbol: &str) -> Result<TickerStats, MarketDataError> {
        self.tickers.fetch_ticker_24h(symbol).await
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        interval: CandleInterval,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError> {
        self.candles.fetch_ohlcv(symbol, interval, limit).await
    }
}
