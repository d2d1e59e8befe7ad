use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Aggregate figures from a global market stats endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalTotals {
    pub total_cap: f64,
    pub btc_dominance: Option<f64>,
    pub eth_dominance: Option<f64>,
}

/// One point of a capitalization series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapSample {
    pub timestamp: DateTime<Utc>,
    pub cap: f64,
}

/// Best available sample for a cutoff: the greatest timestamp that does not
/// exceed `cutoff`. Never interpolates and never returns a later sample.
pub fn last_sample_at_or_before(samples: &[CapSample], cutoff: DateTime<Utc>) -> Option<CapSample> {
    samples
        .iter()
        .filter(|s| s.timestamp <= cutoff)
        .max_by_key(|s| s.timestamp)
        .copied()
}

/// How many members of a basket actually reported data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub requested: usize,
    pub available: usize,
}

impl Coverage {
    pub fn is_complete(&self) -> bool {
        self.requested == self.available
    }
}

/// Current capitalization for a batch of asset ids.
///
/// Ids the upstream did not report sit in `caps` as 0.0 and are listed in
/// `missing`; use [`BucketCaps::get`] to tell a missing id from a real zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketCaps {
    pub caps: HashMap<String, f64>,
    pub missing: Vec<String>,
}

impl BucketCaps {
    pub fn from_reported(ids: &[String], reported: HashMap<String, f64>) -> Self {
        let mut caps = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();

        for id in ids {
            match reported.get(id) {
                Some(cap) if cap.is_finite() && *cap >= 0.0 => {
                    caps.insert(id.clone(), *cap);
                }
                _ => {
                    caps.insert(id.clone(), 0.0);
                    missing.push(id.clone());
                }
            }
        }

        Self { caps, missing }
    }

    /// Everything requested is missing (e.g. the batch call failed)
    pub fn unavailable(ids: &[String]) -> Self {
        Self::from_reported(ids, HashMap::new())
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        if self.missing.iter().any(|m| m == id) {
            return None;
        }
        self.caps.get(id).copied()
    }

    /// Present members only, keyed by id
    pub fn present(&self) -> impl Iterator<Item = (&str, f64)> {
        self.caps
            .iter()
            .filter(|(id, _)| !self.missing.contains(*id))
            .map(|(id, cap)| (id.as_str(), *cap))
    }

    /// Sum over present members, `None` when nothing was reported
    pub fn present_sum(&self) -> Option<f64> {
        let mut any = false;
        let mut sum = 0.0;
        for (_, cap) in self.present() {
            any = true;
            sum += cap;
        }
        any.then_some(sum)
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn coverage(&self) -> Coverage {
        Coverage {
            requested: self.caps.len(),
            available: self.caps.len() - self.missing.len(),
        }
    }
}

/// Tracked capitalization buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
    Btc,
    Eth,
    Alts,
    Stables,
}

impl Bucket {
    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Btc => "BTC",
            Bucket::Eth => "ETH",
            Bucket::Alts => "Alts",
            Bucket::Stables => "Stables",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Dominance percentages, each in [0, 100].
///
/// ETH is part of the altcoin bucket, so the partition is {BTC, Stables, Alts}
/// and `eth` is a nested share of `alt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dominance {
    pub btc: Option<f64>,
    pub eth: Option<f64>,
    pub stable: Option<f64>,
    pub alt: Option<f64>,
}

impl Dominance {
    pub fn partition_sum(&self) -> Option<f64> {
        Some(self.btc? + self.stable? + self.alt?)
    }
}

/// Point-in-time market measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub timestamp: DateTime<Utc>,
    pub total_cap: Option<f64>,
    pub btc_cap: Option<f64>,
    pub eth_cap: Option<f64>,
    pub stable_cap: Option<f64>,
    /// Residual: total - btc - stable, clamped at zero. Includes ETH.
    pub alt_cap: Option<f64>,
    pub dominance: Dominance,
    pub stable_coverage: Coverage,
}

impl MarketSnapshot {
    /// Current market composition for the {BTC, Stables, Alts} partition
    pub fn composition(&self) -> Vec<(Bucket, f64)> {
        [
            (Bucket::Btc, self.btc_cap),
            (Bucket::Stables, self.stable_cap),
            (Bucket::Alts, self.alt_cap),
        ]
        .into_iter()
        .filter_map(|(bucket, cap)| cap.map(|c| (bucket, c)))
        .collect()
    }
}

/// Change between two snapshots separated by `window_minutes`.
///
/// A `None` field means one endpoint was unavailable; it is never a zero change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaSet {
    pub window_minutes: u32,
    pub d_total: Option<f64>,
    pub d_btc: Option<f64>,
    pub d_eth: Option<f64>,
    pub d_stable: Option<f64>,
    pub d_alt: Option<f64>,
    /// `d_alt` is inferred from the ETH delta, not measured
    pub alt_estimated: bool,
    pub stable_members_matched: usize,
}

impl DeltaSet {
    pub fn empty(window_minutes: u32) -> Self {
        Self {
            window_minutes,
            d_total: None,
            d_btc: None,
            d_eth: None,
            d_stable: None,
            d_alt: None,
            alt_estimated: false,
            stable_members_matched: 0,
        }
    }

    /// Per-bucket deltas in leader-selection order, if all four are present
    pub fn bucket_deltas(&self) -> Option<[(Bucket, f64); 4]> {
        Some([
            (Bucket::Btc, self.d_btc?),
            (Bucket::Eth, self.d_eth?),
            (Bucket::Alts, self.d_alt?),
            (Bucket::Stables, self.d_stable?),
        ])
    }

    pub fn is_complete(&self) -> bool {
        self.bucket_deltas().is_some()
    }
}

/// Verdict severity, doubling as the presentation color tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Positive,
    Negative,
    Neutral,
    Rotation,
    Unknown,
}

impl Severity {
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Positive => "green",
            Severity::Negative => "red",
            Severity::Rotation => "orange",
            Severity::Neutral | Severity::Unknown => "gray",
        }
    }
}

/// Which classifier rule produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowKind {
    InsufficientData,
    Inflow { leader: Bucket },
    InflowIntoStables,
    OutflowToStables,
    Outflow,
    RotationAltsToBtc,
    RotationBtcToAlts,
    EthConcentration,
    StableIndecision,
    Neutral,
}

impl FlowKind {
    pub fn label(&self) -> String {
        match self {
            FlowKind::InsufficientData => "insufficient data".to_string(),
            FlowKind::Inflow { leader } => format!("inflow concentrated in {}", leader),
            FlowKind::InflowIntoStables => "inflow with stablecoin concentration".to_string(),
            FlowKind::OutflowToStables => "outflow → flight to stablecoins".to_string(),
            FlowKind::Outflow => "outflow from market".to_string(),
            FlowKind::RotationAltsToBtc => "rotation: alts → BTC".to_string(),
            FlowKind::RotationBtcToAlts => "rotation: BTC → alts".to_string(),
            FlowKind::EthConcentration => "relative concentration in ETH".to_string(),
            FlowKind::StableIndecision => {
                "indecision / short-term flight to stablecoins".to_string()
            }
            FlowKind::Neutral => "neutral / no significant change".to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            FlowKind::InsufficientData => Severity::Unknown,
            FlowKind::Inflow { .. } => Severity::Positive,
            FlowKind::OutflowToStables | FlowKind::Outflow => Severity::Negative,
            FlowKind::InflowIntoStables
            | FlowKind::RotationAltsToBtc
            | FlowKind::RotationBtcToAlts
            | FlowKind::EthConcentration => Severity::Rotation,
            FlowKind::StableIndecision | FlowKind::Neutral => Severity::Neutral,
        }
    }

    pub fn note(&self) -> &'static str {
        match self {
            FlowKind::InsufficientData => {
                "Data for at least one bucket is missing; try again shortly."
            }
            FlowKind::Inflow { .. } => "Net capital growth observed across the market.",
            FlowKind::InflowIntoStables => "Whole market is up but stablecoins are growing too.",
            FlowKind::OutflowToStables => {
                "Capital is leaving crypto assets and parking in stablecoins."
            }
            FlowKind::Outflow => "Net capital is leaving the market.",
            FlowKind::RotationAltsToBtc => "Money is rotating from altcoins into BTC.",
            FlowKind::RotationBtcToAlts => "Money is rotating from BTC into altcoins.",
            FlowKind::EthConcentration => "ETH is stronger than the other buckets.",
            FlowKind::StableIndecision => "Stablecoins are growing without growth in risk buckets.",
            FlowKind::Neutral => "No meaningful change observed.",
        }
    }
}

/// Classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub kind: FlowKind,
    pub label: String,
    pub severity: Severity,
    pub note: String,
}

impl From<FlowKind> for Verdict {
    fn from(kind: FlowKind) -> Self {
        Self {
            kind,
            label: kind.label(),
            severity: kind.severity(),
            note: kind.note().to_string(),
        }
    }
}

impl Verdict {
    pub fn color(&self) -> &'static str {
        self.severity.color()
    }
}

/// 24h trading stats for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerStats {
    pub symbol: String,
    pub last_price: Option<f64>,
    pub price_change_percent: Option<f64>,
    /// Volume in the quote currency (e.g. USDT)
    pub quote_volume: Option<f64>,
}

/// OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Lookback window choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum LookbackWindow {
    Minutes15,
    Hour1,
    Hour4,
    Day1,
}

impl LookbackWindow {
    pub const ALL: [LookbackWindow; 4] = [
        LookbackWindow::Minutes15,
        LookbackWindow::Hour1,
        LookbackWindow::Hour4,
        LookbackWindow::Day1,
    ];

    pub fn minutes(&self) -> u32 {
        match self {
            LookbackWindow::Minutes15 => 15,
            LookbackWindow::Hour1 => 60,
            LookbackWindow::Hour4 => 240,
            LookbackWindow::Day1 => 1440,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LookbackWindow::Minutes15 => "15 minutes",
            LookbackWindow::Hour1 => "1 hour",
            LookbackWindow::Hour4 => "4 hours",
            LookbackWindow::Day1 => "24 hours",
        }
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.minutes() == minutes)
    }
}

impl Default for LookbackWindow {
    fn default() -> Self {
        LookbackWindow::Hour1
    }
}

impl From<LookbackWindow> for u32 {
    fn from(window: LookbackWindow) -> Self {
        window.minutes()
    }
}

impl TryFrom<u32> for LookbackWindow {
    type Error = String;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        LookbackWindow::from_minutes(minutes)
            .ok_or_else(|| {
                format!("unsupported lookback window: {minutes} minutes (use 15, 60, 240 or 1440)")
            })
    }
}

/// Candle interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl CandleInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::Minute1 => "1m",
            CandleInterval::Minute5 => "5m",
            CandleInterval::Minute15 => "15m",
            CandleInterval::Hour1 => "1h",
            CandleInterval::Hour4 => "4h",
            CandleInterval::Day1 => "1d",
        }
    }

    pub fn to_minutes(&self) -> u32 {
        match self {
            CandleInterval::Minute1 => 1,
            CandleInterval::Minute5 => 5,
            CandleInterval::Minute15 => 15,
            CandleInterval::Hour1 => 60,
            CandleInterval::Hour4 => 240,
            CandleInterval::Day1 => 1440,
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandleInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(CandleInterval::Minute1),
            "5m" => Ok(CandleInterval::Minute5),
            "15m" => Ok(CandleInterval::Minute15),
            "1h" => Ok(CandleInterval::Hour1),
            "4h" => Ok(CandleInterval::Hour4),
            "1d" => Ok(CandleInterval::Day1),
            other => Err(format!("unsupported candle interval: {other}")),
        }
    }
}
