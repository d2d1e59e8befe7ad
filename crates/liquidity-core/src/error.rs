use thiserror::Error;

/// Failure of a single upstream quantity.
///
/// Callers degrade these to `None` for the affected value rather than
/// aborting a whole refresh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// Timeout, connection failure, non-2xx status or exhausted retries.
    #[error("Network error: {0}")]
    Network(String),

    /// Response parsed but the expected field was missing or empty, or the
    /// provider does not offer this capability at all.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),
}

impl MarketDataError {
    pub fn unsupported(provider: &str, capability: &str) -> Self {
        MarketDataError::DataUnavailable(format!("{provider} does not provide {capability}"))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, MarketDataError::Network(_))
    }
}
