use anyhow::{bail, Context, Result};
use liquidity_core::{CandleInterval, LookbackWindow, DEFAULT_HISTORY_CAPACITY};
use liquidity_flow::{EthShareBand, LiquidityConfig, NoiseTolerance, SnapshotConfig};
use market_data_client::{ProviderSettings, SourceKind, COINGECKO_DEFAULT_RATE_LIMIT};
use serde::Serialize;
use std::env;
use std::time::Duration;

pub const MIN_REFRESH_INTERVAL_MS: u64 = 5_000;
pub const MAX_REFRESH_INTERVAL_MS: u64 = 60_000;
pub const MAX_CANDLE_LIMIT: u32 = 1000;

/// Dashboard settings, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    // Server
    pub bind_addr: String,
    pub port: u16,

    // Refresh loop
    pub window: LookbackWindow,
    pub refresh_interval: Duration,
    pub auto_refresh: bool,
    pub fetch_timeout: Duration,
    pub history_capacity: usize,

    // Flow analysis
    pub tolerance: NoiseTolerance,
    pub stable_ids: Vec<String>,
    pub eth_share: EthShareBand,

    // Market context
    pub ticker_symbols: Vec<String>,
    pub default_symbol: String,
    pub candle_interval: CandleInterval,
    pub candle_limit: u32,
    pub mfi_period: usize,

    // Providers
    pub cap_source: SourceKind,
    pub ticker_source: SourceKind,
    pub candle_source: SourceKind,
    pub providers: ProviderSettings,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let lookback: u32 = var("LOOKBACK_MINUTES", "60")
            .parse()
            .context("LOOKBACK_MINUTES must be a number of minutes")?;
        let window = LookbackWindow::try_from(lookback).map_err(anyhow::Error::msg)?;

        let refresh_ms: u64 = var("REFRESH_INTERVAL_MS", "15000")
            .parse()
            .context("REFRESH_INTERVAL_MS must be milliseconds")?;
        if !(MIN_REFRESH_INTERVAL_MS..=MAX_REFRESH_INTERVAL_MS).contains(&refresh_ms) {
            bail!(
                "REFRESH_INTERVAL_MS must be between {} and {}, got {}",
                MIN_REFRESH_INTERVAL_MS,
                MAX_REFRESH_INTERVAL_MS,
                refresh_ms
            );
        }

        let tolerance = match var("NOISE_TOLERANCE_MODE", "relative").to_lowercase().as_str() {
            "relative" => NoiseTolerance::Relative {
                ratio: var("NOISE_TOLERANCE_RATIO", "0.0005")
                    .parse()
                    .context("NOISE_TOLERANCE_RATIO")?,
                floor: var("NOISE_TOLERANCE_FLOOR", "5000000")
                    .parse()
                    .context("NOISE_TOLERANCE_FLOOR")?,
            },
            "absolute" => NoiseTolerance::Absolute {
                threshold: var("NOISE_TOLERANCE_ABS", "5000000")
                    .parse()
                    .context("NOISE_TOLERANCE_ABS")?,
            },
            other => bail!(
                "NOISE_TOLERANCE_MODE must be 'relative' or 'absolute', got '{}'",
                other
            ),
        };

        let defaults = SnapshotConfig::default();
        let stable_ids = match lookup("STABLECOIN_IDS") {
            Some(raw) => split_list(&raw),
            None => defaults.stable_ids,
        };

        let candle_limit: u32 = var("CANDLE_LIMIT", "200").parse().context("CANDLE_LIMIT")?;
        if candle_limit == 0 || candle_limit > MAX_CANDLE_LIMIT {
            bail!("CANDLE_LIMIT must be between 1 and {}, got {}", MAX_CANDLE_LIMIT, candle_limit);
        }

        let fetch_timeout_secs: u64 = var("REFRESH_TIMEOUT_SECS", "30")
            .parse()
            .context("REFRESH_TIMEOUT_SECS")?;

        let config = Self {
            bind_addr: var("BIND_ADDR", "0.0.0.0"),
            port: var("PORT", "3000").parse().context("PORT")?,

            window,
            refresh_interval: Duration::from_millis(refresh_ms),
            auto_refresh: var("AUTO_REFRESH", "true").parse().context("AUTO_REFRESH")?,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            history_capacity: var("HISTORY_CAPACITY", &DEFAULT_HISTORY_CAPACITY.to_string())
                .parse()
                .context("HISTORY_CAPACITY")?,

            tolerance,
            stable_ids,
            eth_share: EthShareBand {
                min: var("ETH_SHARE_MIN", "0.15").parse().context("ETH_SHARE_MIN")?,
                max: var("ETH_SHARE_MAX", "0.65").parse().context("ETH_SHARE_MAX")?,
                fallback: var("ETH_SHARE_FALLBACK", "0.35").parse().context("ETH_SHARE_FALLBACK")?,
            },

            ticker_symbols: split_list(&var("TICKER_SYMBOLS", "BTCUSDT,ETHUSDT")),
            default_symbol: var("DEFAULT_SYMBOL", "BTCUSDT").to_uppercase(),
            candle_interval: var("CANDLE_INTERVAL", "1h").parse().map_err(anyhow::Error::msg)?,
            candle_limit,
            mfi_period: var("MFI_PERIOD", "14").parse().context("MFI_PERIOD")?,

            cap_source: var("CAP_SOURCE", "coingecko").parse().map_err(anyhow::Error::msg)?,
            ticker_source: var("TICKER_SOURCE", "binance").parse().map_err(anyhow::Error::msg)?,
            candle_source: var("CANDLE_SOURCE", "binance").parse().map_err(anyhow::Error::msg)?,
            providers: ProviderSettings {
                coingecko_base_url: lookup("COINGECKO_BASE_URL"),
                coingecko_api_key: lookup("COINGECKO_API_KEY").filter(|k| !k.is_empty()),
                coingecko_rate_limit: lookup("COINGECKO_RATE_LIMIT")
                    .map(|v| v.parse())
                    .transpose()
                    .context("COINGECKO_RATE_LIMIT")?,
                binance_base_url: lookup("BINANCE_BASE_URL"),
                cryptocompare_base_url: lookup("CRYPTOCOMPARE_BASE_URL"),
                cryptocompare_api_key: lookup("CRYPTOCOMPARE_API_KEY").filter(|k| !k.is_empty()),
            },
        };

        if config.cap_source == SourceKind::Binance {
            bail!("CAP_SOURCE=binance is not supported: Binance has no market capitalization data");
        }
        if config.candle_source == SourceKind::CoinGecko {
            bail!("CANDLE_SOURCE=coingecko is not supported: CoinGecko has no OHLCV volume data");
        }
        if config.mfi_period == 0 {
            bail!("MFI_PERIOD must be positive");
        }
        if config.cap_source == SourceKind::CoinGecko {
            config.check_coingecko_budget()?;
        }

        config.liquidity_config().validate()?;
        Ok(config)
    }

    /// A cold refresh must fit in one minute of CoinGecko budget, and warm
    /// refreshes at the configured cadence must stay under the limit
    fn check_coingecko_budget(&self) -> Result<()> {
        let limit = self
            .providers
            .coingecko_rate_limit
            .unwrap_or(COINGECKO_DEFAULT_RATE_LIMIT);
        let calls = self.liquidity_config().snapshot.upstream_calls();

        if calls.cold() > limit {
            bail!(
                "a cold refresh makes {} CoinGecko calls but COINGECKO_RATE_LIMIT is {}; \
                 shorten STABLECOIN_IDS or raise the limit",
                calls.cold(),
                limit
            );
        }

        let per_minute = calls.current as u128 * 60_000 / self.refresh_interval.as_millis().max(1);
        if per_minute > limit as u128 {
            bail!(
                "refreshing every {}ms makes {} CoinGecko calls per minute \
                 but COINGECKO_RATE_LIMIT is {}; raise REFRESH_INTERVAL_MS or the limit",
                self.refresh_interval.as_millis(),
                per_minute,
                limit
            );
        }
        Ok(())
    }

    pub fn liquidity_config(&self) -> LiquidityConfig {
        LiquidityConfig {
            snapshot: SnapshotConfig {
                stable_ids: self.stable_ids.clone(),
                eth_share: self.eth_share,
                fetch_timeout: self.fetch_timeout,
                ..SnapshotConfig::default()
            },
            tolerance: self.tolerance,
            ticker_symbols: self.ticker_symbols.clone(),
        }
    }

    /// Effective settings without secrets
    pub fn view(&self) -> ConfigView {
        ConfigView {
            window_minutes: self.window.minutes(),
            window_label: self.window.label(),
            refresh_interval_ms: self.refresh_interval.as_millis() as u64,
            fetch_timeout_secs: self.fetch_timeout.as_secs(),
            history_capacity: self.history_capacity,
            tolerance: self.tolerance,
            stable_ids: self.stable_ids.clone(),
            eth_share: self.eth_share,
            ticker_symbols: self.ticker_symbols.clone(),
            default_symbol: self.default_symbol.clone(),
            candle_interval: self.candle_interval,
            candle_limit: self.candle_limit,
            mfi_period: self.mfi_period,
            cap_source: self.cap_source,
            ticker_source: self.ticker_source,
            candle_source: self.candle_source,
            coingecko_api_key_set: self.providers.coingecko_api_key.is_some(),
            cryptocompare_api_key_set: self.providers.cryptocompare_api_key.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigView {
    pub window_minutes: u32,
    pub window_label: &'static str,
    pub refresh_interval_ms: u64,
    pub fetch_timeout_secs: u64,
    pub history_capacity: usize,
    pub tolerance: NoiseTolerance,
    pub stable_ids: Vec<String>,
    pub eth_share: EthShareBand,
    pub ticker_symbols: Vec<String>,
    pub default_symbol: String,
    pub candle_interval: CandleInterval,
    pub candle_limit: u32,
    pub mfi_period: usize,
    pub cap_source: SourceKind,
    pub ticker_source: SourceKind,
    pub candle_source: SourceKind,
    pub coingecko_api_key_set: bool,
    pub cryptocompare_api_key_set: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<DashboardConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DashboardConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.window, LookbackWindow::Hour1);
        assert_eq!(config.refresh_interval, Duration::from_secs(15));
        assert_eq!(config.port, 3000);
        assert!(config.auto_refresh);
        assert_eq!(config.tolerance, NoiseTolerance::default());
        assert_eq!(config.stable_ids.len(), 7);
        assert_eq!(config.ticker_symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(config.candle_interval, CandleInterval::Hour1);
        assert_eq!(config.cap_source, SourceKind::CoinGecko);
        assert_eq!(config.candle_source, SourceKind::Binance);
        assert_eq!(config.history_capacity, 200);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("LOOKBACK_MINUTES", "240"),
            ("REFRESH_INTERVAL_MS", "30000"),
            ("NOISE_TOLERANCE_MODE", "absolute"),
            ("NOISE_TOLERANCE_ABS", "10000000"),
            ("STABLECOIN_IDS", "tether, usd-coin ,"),
            ("CANDLE_SOURCE", "cryptocompare"),
            ("CANDLE_INTERVAL", "15m"),
            ("DEFAULT_SYMBOL", "ethusdt"),
            ("COINGECKO_RATE_LIMIT", "10"),
        ])
        .unwrap();

        assert_eq!(config.window, LookbackWindow::Hour4);
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.tolerance, NoiseTolerance::Absolute { threshold: 1e7 });
        assert_eq!(config.stable_ids, vec!["tether", "usd-coin"]);
        assert_eq!(config.candle_source, SourceKind::CryptoCompare);
        assert_eq!(config.candle_interval, CandleInterval::Minute15);
        assert_eq!(config.default_symbol, "ETHUSDT");
        assert_eq!(config.providers.coingecko_rate_limit, Some(10));
    }

    #[test]
    fn test_rejects_unsupported_window() {
        let err = config_from(&[("LOOKBACK_MINUTES", "30")]).unwrap_err();
        assert!(err.to_string().contains("unsupported lookback window"));
    }

    #[test]
    fn test_refresh_interval_bounds() {
        assert!(config_from(&[("REFRESH_INTERVAL_MS", "4999")]).is_err());
        assert!(config_from(&[("REFRESH_INTERVAL_MS", "60001")]).is_err());
        assert!(
            config_from(&[("REFRESH_INTERVAL_MS", "5000"), ("COINGECKO_RATE_LIMIT", "60")]).is_ok()
        );
        assert!(config_from(&[("REFRESH_INTERVAL_MS", "60000")]).is_ok());
    }

    #[test]
    fn test_coingecko_budget() {
        // 3 calls per warm refresh, 12 when cold
        assert!(config_from(&[]).is_ok());
        assert!(config_from(&[("REFRESH_INTERVAL_MS", "6000")]).is_ok());

        let err = config_from(&[("REFRESH_INTERVAL_MS", "5000")]).unwrap_err();
        assert!(err.to_string().contains("36 CoinGecko calls per minute"));
        assert!(
            config_from(&[("REFRESH_INTERVAL_MS", "5000"), ("COINGECKO_RATE_LIMIT", "36")]).is_ok()
        );

        let err = config_from(&[("COINGECKO_RATE_LIMIT", "10")]).unwrap_err();
        assert!(err.to_string().contains("cold refresh makes 12 CoinGecko calls"));
        assert!(config_from(&[
            ("COINGECKO_RATE_LIMIT", "10"),
            ("STABLECOIN_IDS", "tether,usd-coin"),
            ("REFRESH_INTERVAL_MS", "30000"),
        ])
        .is_ok());

        // Other cap sources are not bound by the CoinGecko limit
        assert!(
            config_from(&[("REFRESH_INTERVAL_MS", "5000"), ("CAP_SOURCE", "cryptocompare")]).is_ok()
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(config_from(&[("CANDLE_INTERVAL", "2h")]).is_err());
        assert!(config_from(&[("CANDLE_LIMIT", "0")]).is_err());
        assert!(config_from(&[("CAP_SOURCE", "binance")]).is_err());
        assert!(config_from(&[("TICKER_SOURCE", "kraken")]).is_err());
        assert!(config_from(&[("NOISE_TOLERANCE_MODE", "adaptive")]).is_err());
        assert!(config_from(&[("STABLECOIN_IDS", " , ")]).is_err());
        assert!(config_from(&[("ETH_SHARE_MIN", "0.8")]).is_err());
    }

    #[test]
    fn test_view_hides_keys() {
        let config = config_from(&[("COINGECKO_API_KEY", "CG-secret")]).unwrap();
        let json = serde_json::to_string(&config.view()).unwrap();

        assert!(!json.contains("CG-secret"));
        assert!(json.contains("\"coingecko_api_key_set\":true"));
        assert!(json.contains("\"window_minutes\":60"));
        assert!(!format!("{:?}", config).contains("CG-secret"));
    }
}
