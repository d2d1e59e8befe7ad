use liquidity_core::Candle;
use serde::{Deserialize, Serialize};

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(sum / period as f64);
    }
    result
}

/// (high + low + close) / 3
pub fn typical_price(candle: &Candle) -> f64 {
    (candle.high + candle.low + candle.close) / 3.0
}

/// On-Balance Volume, starting from zero at the first candle
pub fn obv(candles: &[Candle]) -> Vec<f64> {
    if candles.is_empty() {
        return vec![];
    }

    let mut obv_values = Vec::with_capacity(candles.len());
    obv_values.push(0.0);

    for i in 1..candles.len() {
        let prev_obv = obv_values[i - 1];
        let new_obv = if candles[i].close > candles[i - 1].close {
            prev_obv + candles[i].volume
        } else if candles[i].close < candles[i - 1].close {
            prev_obv - candles[i].volume
        } else {
            prev_obv
        };
        obv_values.push(new_obv);
    }

    obv_values
}

/// Money Flow Index over `period` candles.
///
/// One value per candle from index `period` onwards, each in [0, 100].
/// A window with no negative money flow reads 100.
pub fn mfi(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period + 1 {
        return vec![];
    }

    let typical: Vec<f64> = candles.iter().map(typical_price).collect();
    let mut positive = Vec::with_capacity(candles.len() - 1);
    let mut negative = Vec::with_capacity(candles.len() - 1);

    for i in 1..candles.len() {
        let raw_flow = typical[i] * candles[i].volume;
        if typical[i] > typical[i - 1] {
            positive.push(raw_flow);
            negative.push(0.0);
        } else if typical[i] < typical[i - 1] {
            positive.push(0.0);
            negative.push(raw_flow);
        } else {
            positive.push(0.0);
            negative.push(0.0);
        }
    }

    let mut mfi_values = Vec::with_capacity(positive.len() + 1 - period);
    for end in period..=positive.len() {
        let pos: f64 = positive[end - period..end].iter().sum();
        let neg: f64 = negative[end - period..end].iter().sum();

        let value = if neg == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + pos / neg)
        };
        mfi_values.push(value.clamp(0.0, 100.0));
    }

    mfi_values
}

/// Volume split by candle direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeDirection {
    pub up_volume: f64,
    pub down_volume: f64,
    /// up / (up + down); `None` when neither side traded
    pub up_ratio: Option<f64>,
}

/// Volume on candles that closed above vs below their open.
/// Doji candles count toward neither side.
pub fn volume_direction(candles: &[Candle]) -> VolumeDirection {
    let mut up_volume = 0.0;
    let mut down_volume = 0.0;

    for candle in candles {
        if candle.close > candle.open {
            up_volume += candle.volume;
        } else if candle.close < candle.open {
            down_volume += candle.volume;
        }
    }

    let directional = up_volume + down_volume;
    VolumeDirection {
        up_volume,
        down_volume,
        up_ratio: (directional > 0.0).then(|| up_volume / directional),
    }
}
