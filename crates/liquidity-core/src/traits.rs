use async_trait::async_trait;
use std::collections::HashMap;

use crate::{CandleInterval, CapSample, Candle, GlobalTotals, MarketDataError, TickerStats};

/// A market-data provider.
///
/// Providers that lack a capability return [`MarketDataError::DataUnavailable`]
/// for it, so implementations are interchangeable behind configuration.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &'static str;

    /// Aggregate capitalization and BTC/ETH dominance
    async fn fetch_global(&self) -> Result<GlobalTotals, MarketDataError>;

    /// Current capitalization for a batch of asset ids. Ids the provider did
    /// not report are simply absent from the map.
    async fn fetch_caps(&self, ids: &[String]) -> Result<HashMap<String, f64>, MarketDataError>;

    /// Capitalization series covering at least `lookback_minutes`, oldest first
    async fn fetch_history(
        &self,
        asset_id: &str,
        lookback_minutes: u32,
    ) -> Result<Vec<CapSample>, MarketDataError>;

    /// 24h trading stats for an exchange symbol such as `BTCUSDT`
    async fn fetch_ticker_24h(&self, symbol: &str) -> Result<TickerStats, MarketDataError>;

    /// OHLCV candles, oldest first
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        interval: CandleInterval,
        limit: u32,
    ) -> Result<Vec<Candle>, MarketDataError>;
}
