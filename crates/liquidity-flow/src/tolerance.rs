use serde::{Deserialize, Serialize};

/// 0.05% of total market cap
pub const DEFAULT_TOLERANCE_RATIO: f64 = 0.0005;
/// $5M
pub const DEFAULT_TOLERANCE_FLOOR: f64 = 5e6;

/// Dead-band under which a delta counts as noise.
///
/// A fixed dollar threshold means different things at a $1T and a $4T
/// market, so the default scales with total cap and keeps a floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NoiseTolerance {
    Absolute { threshold: f64 },
    Relative { ratio: f64, floor: f64 },
}

impl Default for NoiseTolerance {
    fn default() -> Self {
        NoiseTolerance::Relative {
            ratio: DEFAULT_TOLERANCE_RATIO,
            floor: DEFAULT_TOLERANCE_FLOOR,
        }
    }
}

impl NoiseTolerance {
    /// Threshold in USD for a market of `total_cap`
    pub fn resolve(&self, total_cap: Option<f64>) -> f64 {
        match *self {
            NoiseTolerance::Absolute { threshold } => threshold.abs(),
            NoiseTolerance::Relative { ratio, floor } => match total_cap {
                Some(total) if total.is_finite() && total > 0.0 => {
                    (ratio.abs() * total).max(floor.abs())
                }
                _ => floor.abs(),
            },
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            NoiseTolerance::Absolute { .. } => "absolute",
            NoiseTolerance::Relative { .. } => "relative",
        }
    }
}
