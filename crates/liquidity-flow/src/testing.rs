//! In-memory market for builder and analyzer tests

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use liquidity_core::{
    Candle, CandleInterval, CapSample, GlobalTotals, MarketDataError, MarketDataSource, TickerStats,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeSource {
    pub global: Option<GlobalTotals>,
    pub caps: HashMap<String, f64>,
    pub history: HashMap<String, Vec<CapSample>>,
    pub tickers: HashMap<String, TickerStats>,
    pub fail_caps: bool,
    pub hang_history: bool,
    pub history_calls: Arc<AtomicUsize>,
}

impl FakeSource {
    /// $2.4T market where BTC gained $10B, ETH $2B and tether $100M since
    /// two days ago
    pub fn healthy() -> Self {
        let now = Utc::now();
        let series = |prev: f64, recent: f64| {
            vec![
                CapSample {
                    timestamp: now - ChronoDuration::minutes(2880),
                    cap: prev,
                },
                CapSample {
                    timestamp: now - ChronoDuration::minutes(5),
                    cap: recent,
                },
            ]
        };

        let mut caps = HashMap::new();
        caps.insert("bitcoin".to_string(), 1.25e12);
        caps.insert("ethereum".to_string(), 0.40e12);
        caps.insert("tether".to_string(), 110e9);
        caps.insert("usd-coin".to_string(), 33e9);

        let mut history = HashMap::new();
        history.insert("bitcoin".to_string(), series(1.24e12, 1.249e12));
        history.insert("ethereum".to_string(), series(0.398e12, 0.3995e12));
        history.insert("tether".to_string(), series(109.9e9, 109.99e9));
        history.insert("usd-coin".to_string(), series(33e9, 33e9));

        let mut tickers = HashMap::new();
        tickers.insert(
            "BTCUSDT".to_string(),
            TickerStats {
                symbol: "BTCUSDT".to_string(),
                last_price: Some(63250.5),
                price_change_percent: Some(1.8),
                quote_volume: Some(1.9e9),
            },
        );

        Self {
            global: Some(GlobalTotals {
                total_cap: 2.4e12,
                btc_dominance: Some(52.1),
                eth_dominance: Some(16.7),
            }),
            caps,
            history,
            tickers,
            fail_caps: false,
            hang_history: false,
            history_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl MarketDataSource for FakeSource {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_global(&self) -> Result<GlobalTotals, MarketDataError> {
        self.global
            .clone()
            .ok_or_else(|| MarketDataError::Network("fake /global: HTTP 503".to_string()))
    }

    async fn fetch_caps(&self, ids: &[String]) -> Result<HashMap<String, f64>, MarketDataError> {
        if self.fail_caps {
            return Err(MarketDataError::Network("fake caps: connection refused".to_string()));
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.caps.get(id).map(|cap| (id.clone(), *cap)))
            .collect())
    }

    async fn fetch_history(
        &self,
        asset_id: &str,
        _lookback_minutes: u32,
    ) -> Result<Vec<CapSample>, MarketDataError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_history {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.history
            .get(asset_id)
            .cloned()
            .ok_or_else(|| {
                MarketDataError::DataUnavailable(format!("fake: no history for {}", asset_id))
            })
    }

    async fn fetch_ticker_24h(&self, symbol: &str) -> Result<TickerStats, MarketDataError> {
        self.tickers
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::Network(format!("fake ticker {}: HTTP 400", symbol)))
    }

    async fn fetch_ohlcv(
        &self,
        _symbol: &str,
        _interval: CandleInterval,
        _limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError> {
        Err(MarketDataError::unsupported("fake", "candles"))
    }
}
