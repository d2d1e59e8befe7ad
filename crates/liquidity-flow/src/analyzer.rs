use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use liquidity_core::{
    Bucket, DeltaSet, HistoryEntry, LookbackWindow, MarketDataSource, MarketSnapshot, TickerStats,
    Verdict,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::classifier::classify;
use crate::config::LiquidityConfig;
use crate::snapshot::SnapshotBuilder;
use crate::tolerance::NoiseTolerance;

/// One bucket of the current market composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionSlice {
    pub bucket: Bucket,
    pub cap: f64,
    /// Percent of the tracked partition
    pub share: f64,
}

/// Everything a presentation layer needs for one refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub generated_at: DateTime<Utc>,
    pub window: LookbackWindow,
    pub window_label: String,
    pub snapshot: MarketSnapshot,
    pub deltas: DeltaSet,
    /// Resolved noise threshold in USD
    pub tolerance: f64,
    pub verdict: Verdict,
    pub tickers: Vec<TickerStats>,
    pub composition: Vec<CompositionSlice>,
}

impl RefreshReport {
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            recorded_at: self.generated_at,
            deltas: self.deltas.clone(),
            verdict: self.verdict.clone(),
        }
    }
}

fn composition(snapshot: &MarketSnapshot) -> Vec<CompositionSlice> {
    let parts = snapshot.composition();
    let total: f64 = parts.iter().map(|(_, cap)| cap).sum();

    parts
        .into_iter()
        .map(|(bucket, cap)| CompositionSlice {
            bucket,
            cap,
            share: if total > 0.0 { cap / total * 100.0 } else { 0.0 },
        })
        .collect()
}

/// Runs one full refresh: snapshot, deltas, verdict and ticker context
pub struct LiquidityAnalyzer {
    source: Arc<dyn MarketDataSource>,
    builder: SnapshotBuilder,
    tolerance: NoiseTolerance,
    ticker_symbols: Vec<String>,
}

impl LiquidityAnalyzer {
    pub fn new(source: Arc<dyn MarketDataSource>, config: LiquidityConfig) -> Self {
        Self {
            builder: SnapshotBuilder::new(source.clone(), config.snapshot),
            source,
            tolerance: config.tolerance,
            ticker_symbols: config.ticker_symbols,
        }
    }

    pub fn source(&self) -> &Arc<dyn MarketDataSource> {
        &self.source
    }

    pub fn builder(&self) -> &SnapshotBuilder {
        &self.builder
    }

    pub fn tolerance(&self) -> NoiseTolerance {
        self.tolerance
    }

    pub fn ticker_symbols(&self) -> &[String] {
        &self.ticker_symbols
    }

    pub async fn refresh(&self, window: LookbackWindow) -> RefreshReport {
        let ((snapshot, deltas), tickers) =
            tokio::join!(self.builder.build(window), self.fetch_tickers(&self.ticker_symbols));

        let tolerance = self.tolerance.resolve(snapshot.total_cap);
        let verdict = classify(&deltas, tolerance);

        tracing::info!(
            "Liquidity verdict ({}): {} [tolerance ${:.0}]",
            window.label(),
            verdict.label,
            tolerance
        );

        RefreshReport {
            generated_at: Utc::now(),
            window,
            window_label: window.label().to_string(),
            composition: composition(&snapshot),
            snapshot,
            deltas,
            tolerance,
            verdict,
            tickers,
        }
    }

    /// 24h stats for `symbols`; failed symbols are logged and left out
    pub async fn fetch_tickers(&self, symbols: &[String]) -> Vec<TickerStats> {
        let timeout = self.builder.config().fetch_timeout;
        let results = join_all(symbols.iter().map(|symbol| async move {
            let result = tokio::time::timeout(timeout, self.source.fetch_ticker_24h(symbol)).await;
            (symbol, result)
        }))
        .await;

        results
            .into_iter()
            .filter_map(|(symbol, result)| match result {
                Ok(Ok(ticker)) => Some(ticker),
                Ok(Err(e)) => {
                    tracing::warn!("Ticker {} unavailable: {}", symbol, e);
                    None
                }
                Err(_) => {
                    tracing::warn!("Ticker {} timed out", symbol);
                    None
                }
            })
            .collect()
    }
}
