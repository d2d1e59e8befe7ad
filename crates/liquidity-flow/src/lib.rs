//! Liquidity Flow
//!
//! Builds market snapshots from a [`MarketDataSource`](liquidity_core::MarketDataSource),
//! derives bucket deltas over a lookback window and classifies the
//! direction of capital flow.

pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod metrics;
pub mod snapshot;
pub mod tolerance;

#[cfg(test)]
mod testing;

pub use analyzer::{CompositionSlice, LiquidityAnalyzer, RefreshReport};
pub use classifier::{classify, classify_kind};
pub use config::{
    ConfigError, LiquidityConfig, SnapshotConfig, UpstreamCalls, DEFAULT_STABLE_IDS,
    DEFAULT_TICKER_SYMBOLS,
};
pub use metrics::{
    compute_alt_cap, compute_dominance, compute_total_delta, delta, estimate_alt_delta,
    stable_delta, EthShareBand, StableDelta,
};
pub use snapshot::SnapshotBuilder;
pub use tolerance::NoiseTolerance;
