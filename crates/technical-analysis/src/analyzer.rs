use liquidity_core::Candle;
use serde::{Deserialize, Serialize};

use crate::indicators::*;

pub const DEFAULT_MFI_PERIOD: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObvTrend {
    Rising,
    Falling,
    Flat,
}

impl ObvTrend {
    pub fn label(&self) -> &'static str {
        match self {
            ObvTrend::Rising => "accumulation",
            ObvTrend::Falling => "distribution",
            ObvTrend::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MfiZone {
    Overbought,
    Oversold,
    Neutral,
}

impl MfiZone {
    pub fn from_value(mfi: f64) -> Self {
        if mfi >= 80.0 {
            MfiZone::Overbought
        } else if mfi <= 20.0 {
            MfiZone::Oversold
        } else {
            MfiZone::Neutral
        }
    }
}

/// Volume-flow summary of a candle series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleAnalysis {
    pub candle_count: usize,
    pub last_close: Option<f64>,
    pub obv: Option<f64>,
    pub obv_trend: ObvTrend,
    pub mfi: Option<f64>,
    pub mfi_zone: Option<MfiZone>,
    pub volume: VolumeDirection,
    /// Mean volume over the last `mfi_period` candles
    pub avg_volume: Option<f64>,
}

impl CandleAnalysis {
    pub fn from_candles(candles: &[Candle], mfi_period: usize) -> Self {
        let obv_values = obv(candles);
        let mfi_value = mfi(candles, mfi_period).last().copied();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

        Self {
            candle_count: candles.len(),
            last_close: candles.last().map(|c| c.close),
            obv: obv_values.last().copied(),
            obv_trend: obv_trend(&obv_values, mfi_period),
            mfi: mfi_value,
            mfi_zone: mfi_value.map(MfiZone::from_value),
            volume: volume_direction(candles),
            avg_volume: sma(&volumes, mfi_period).last().copied(),
        }
    }
}

/// Sign of the OBV change over the last `lookback` candles
fn obv_trend(obv_values: &[f64], lookback: usize) -> ObvTrend {
    let Some(&last) = obv_values.last() else {
        return ObvTrend::Flat;
    };
    let back = lookback.max(1).min(obv_values.len() - 1);
    let change = last - obv_values[obv_values.len() - 1 - back];

    if change > 0.0 {
        ObvTrend::Rising
    } else if change < 0.0 {
        ObvTrend::Falling
    } else {
        ObvTrend::Flat
    }
}
