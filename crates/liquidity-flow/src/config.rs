use std::time::Duration;
use thiserror::Error;

use crate::metrics::EthShareBand;
use crate::tolerance::NoiseTolerance;

/// Major USD stablecoins by CoinGecko id
pub const DEFAULT_STABLE_IDS: &[&str] = &[
    "tether",
    "usd-coin",
    "dai",
    "true-usd",
    "first-digital-usd",
    "paypal-usd",
    "ethena-usde",
];

pub const DEFAULT_TICKER_SYMBOLS: &[&str] = &["BTCUSDT", "ETHUSDT"];

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("stablecoin basket is empty")]
    EmptyStableBasket,

    #[error("ETH share band invalid: {0}")]
    InvalidEthShareBand(String),

    #[error("noise tolerance invalid: {0}")]
    InvalidTolerance(String),

    #[error("fetch timeout must be positive")]
    ZeroTimeout,
}

/// What the snapshot builder tracks and how long it waits
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub btc_id: String,
    pub eth_id: String,
    pub stable_ids: Vec<String>,
    pub eth_share: EthShareBand,
    /// Budget for each upstream fetch within one refresh
    pub fetch_timeout: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            btc_id: "bitcoin".to_string(),
            eth_id: "ethereum".to_string(),
            stable_ids: DEFAULT_STABLE_IDS.iter().map(|s| s.to_string()).collect(),
            eth_share: EthShareBand::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl SnapshotConfig {
    /// Upstream calls one build makes against the capitalization source
    pub fn upstream_calls(&self) -> UpstreamCalls {
        UpstreamCalls {
            // global totals, core caps batch, stable caps batch
            current: 3,
            history: 2 + self.stable_ids.len(),
        }
    }
}

/// Capitalization-source calls per snapshot build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamCalls {
    /// Made on every build
    pub current: usize,
    /// One per tracked asset; skipped while a cached series still reaches
    /// the cutoff
    pub history: usize,
}

impl UpstreamCalls {
    /// Calls made when nothing is cached yet
    pub fn cold(&self) -> usize {
        self.current + self.history
    }
}

#[derive(Debug, Clone, Default)]
pub struct LiquidityConfig {
    pub snapshot: SnapshotConfig,
    pub tolerance: NoiseTolerance,
    /// Exchange symbols whose 24h stats accompany each refresh
    pub ticker_symbols: Vec<String>,
}

impl LiquidityConfig {
    pub fn with_default_tickers(mut self) -> Self {
        self.ticker_symbols = DEFAULT_TICKER_SYMBOLS.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot.stable_ids.is_empty() {
            return Err(ConfigError::EmptyStableBasket);
        }

        let band = &self.snapshot.eth_share;
        if !(band.min > 0.0 && band.min <= band.max && band.max <= 1.0) {
            return Err(ConfigError::InvalidEthShareBand(format!(
                "need 0 < min <= max <= 1, got [{}, {}]",
                band.min, band.max
            )));
        }
        if !(band.min..=band.max).contains(&band.fallback) {
            return Err(ConfigError::InvalidEthShareBand(format!(
                "fallback {} outside [{}, {}]",
                band.fallback, band.min, band.max
            )));
        }

        match self.tolerance {
            NoiseTolerance::Absolute { threshold }
                if !(threshold.is_finite() && threshold >= 0.0) =>
            {
                return Err(ConfigError::InvalidTolerance(format!("threshold {}", threshold)));
            }
            NoiseTolerance::Relative { ratio, floor }
                if !(ratio.is_finite() && ratio >= 0.0 && floor.is_finite() && floor >= 0.0) =>
            {
                return Err(ConfigError::InvalidTolerance(format!(
                    "ratio {} floor {}",
                    ratio, floor
                )));
            }
            _ => {}
        }

        if self.snapshot.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }
}
