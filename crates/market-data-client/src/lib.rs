//! HTTP clients for public crypto market-data providers.
//!
//! Every client implements [`liquidity_core::MarketDataSource`]; capabilities a
//! provider does not offer answer `DataUnavailable`. [`CompositeSource`] routes
//! each capability to the provider chosen by configuration.

pub mod binance;
pub mod coingecko;
pub mod composite;
pub mod cryptocompare;
pub mod http;

pub use binance::{BinanceClient, BINANCE_BASE_URL};
pub use coingecko::{CoinGeckoClient, COINGECKO_BASE_URL, COINGECKO_DEFAULT_RATE_LIMIT};
pub use composite::{CompositeSource, ProviderSettings, SourceKind};
pub use cryptocompare::{CryptoCompareClient, CRYPTOCOMPARE_BASE_URL};
pub use http::{JsonFetcher, RetryPolicy};
