//! Bucket Metrics
//!
//! Pure arithmetic over capitalization figures: the altcoin residual,
//! the ETH-proxied alt delta, sum-of-parts total delta, dominance and
//! the stablecoin basket delta.

use liquidity_core::{BucketCaps, CapSample, Dominance, GlobalTotals};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_ETH_SHARE_MIN: f64 = 0.15;
pub const DEFAULT_ETH_SHARE_MAX: f64 = 0.65;
pub const DEFAULT_ETH_SHARE_FALLBACK: f64 = 0.35;

/// Bounds on ETH's share of the altcoin bucket.
///
/// The alt delta is estimated by scaling the ETH delta by the inverse of
/// this share, so the band keeps the multiplier between ~1.5x and ~6.7x.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EthShareBand {
    pub min: f64,
    pub max: f64,
    /// Used when the share cannot be measured
    pub fallback: f64,
}

impl Default for EthShareBand {
    fn default() -> Self {
        Self {
            min: DEFAULT_ETH_SHARE_MIN,
            max: DEFAULT_ETH_SHARE_MAX,
            fallback: DEFAULT_ETH_SHARE_FALLBACK,
        }
    }
}

impl EthShareBand {
    pub fn clamp(&self, share: f64) -> f64 {
        if !share.is_finite() {
            return self.fallback.max(self.min).min(self.max);
        }
        share.max(self.min).min(self.max)
    }

    /// ETH share of the alt bucket from current caps
    pub fn measure(&self, eth_cap: Option<f64>, alt_cap: Option<f64>) -> f64 {
        match (eth_cap, alt_cap) {
            (Some(eth), Some(alt)) if eth > 0.0 && alt > 0.0 => eth / alt,
            _ => self.fallback,
        }
    }
}

/// Altcoin residual. Never negative.
pub fn compute_alt_cap(total: f64, btc: f64, stable: f64) -> f64 {
    // f64::max drops NaN, so a NaN residual also lands on 0.0
    (total - btc - stable).max(0.0)
}

/// Alt delta inferred from the ETH delta: `d_eth / clamp(share)`
pub fn estimate_alt_delta(
    d_eth: Option<f64>,
    eth_share_of_alts: f64,
    band: &EthShareBand,
) -> Option<f64> {
    let share = band.clamp(eth_share_of_alts);
    d_eth.map(|d| d / share)
}

/// Sum of parts; `None` if any part is missing
pub fn compute_total_delta(
    d_btc: Option<f64>,
    d_stable: Option<f64>,
    d_alt: Option<f64>,
) -> Option<f64> {
    Some(d_btc? + d_stable? + d_alt?)
}

/// Change between two endpoints; `None` unless both are known
pub fn delta(now: Option<f64>, prev: Option<f64>) -> Option<f64> {
    Some(now? - prev?)
}

fn percent_of(part: Option<f64>, total: Option<f64>) -> Option<f64> {
    match (part, total) {
        (Some(part), Some(total)) if total > 0.0 => Some((part / total * 100.0).clamp(0.0, 100.0)),
        _ => None,
    }
}

/// Dominance derived from caps.
///
/// The aggregate endpoint's BTC/ETH dominance is only consulted when the
/// corresponding cap is missing.
pub fn compute_dominance(
    total: Option<f64>,
    btc: Option<f64>,
    eth: Option<f64>,
    stable: Option<f64>,
    alt: Option<f64>,
    fallback: Option<&GlobalTotals>,
) -> Dominance {
    let fetched = |pick: fn(&GlobalTotals) -> Option<f64>| {
        fallback
            .and_then(pick)
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 100.0))
    };

    Dominance {
        btc: percent_of(btc, total).or_else(|| fetched(|g| g.btc_dominance)),
        eth: percent_of(eth, total).or_else(|| fetched(|g| g.eth_dominance)),
        stable: percent_of(stable, total),
        alt: percent_of(alt, total),
    }
}

/// Stablecoin basket delta restricted to members seen at both endpoints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StableDelta {
    pub delta: Option<f64>,
    pub matched: usize,
}

/// Sum of `now - prev` over members present now with a historical sample.
///
/// A member that only reports at one endpoint is left out entirely, so a
/// provider dropping a coin cannot show up as an outflow.
pub fn stable_delta(now: &BucketCaps, prev: &HashMap<String, CapSample>) -> StableDelta {
    let mut matched = 0;
    let mut sum = 0.0;

    for (id, cap_now) in now.present() {
        if let Some(sample) = prev.get(id) {
            sum += cap_now - sample.cap;
            matched += 1;
        }
    }

    StableDelta {
        delta: (matched > 0).then_some(sum),
        matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(cap: f64) -> CapSample {
        CapSample { timestamp: Utc::now(), cap }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_alt_cap_never_negative() {
        assert_eq!(compute_alt_cap(2.5e12, 1.3e12, 0.16e12), 2.5e12 - 1.3e12 - 0.16e12);
        assert_eq!(compute_alt_cap(1.0e12, 1.3e12, 0.16e12), 0.0);
        assert_eq!(compute_alt_cap(f64::NAN, 1.0, 1.0), 0.0);

        for total in [-1e12, 0.0, 1e9, 3e12] {
            for btc in [0.0, 5e11, 2e12] {
                for stable in [0.0, 1e11, 4e12] {
                    assert!(compute_alt_cap(total, btc, stable) >= 0.0);
                }
            }
        }
    }

    #[test]
    fn test_estimate_alt_delta_clamps_share() {
        let band = EthShareBand::default();

        // Below the band: 0.05 -> 0.15
        let d = estimate_alt_delta(Some(15e6), 0.05, &band).unwrap();
        assert!((d - 100e6).abs() < 1e-3);

        // Above the band: 0.9 -> 0.65
        let d = estimate_alt_delta(Some(6.5e6), 0.9, &band).unwrap();
        assert!((d - 10e6).abs() < 1e-3);

        // Inside the band untouched
        let d = estimate_alt_delta(Some(4e6), 0.4, &band).unwrap();
        assert!((d - 10e6).abs() < 1e-3);

        assert_eq!(estimate_alt_delta(None, 0.4, &band), None);
    }

    #[test]
    fn test_eth_share_fallback_when_unmeasurable() {
        let band = EthShareBand::default();
        assert_eq!(band.measure(Some(4e11), Some(1e12)), 0.4);
        assert_eq!(band.measure(None, Some(1e12)), DEFAULT_ETH_SHARE_FALLBACK);
        assert_eq!(band.measure(Some(4e11), Some(0.0)), DEFAULT_ETH_SHARE_FALLBACK);
        assert_eq!(band.clamp(f64::NAN), DEFAULT_ETH_SHARE_FALLBACK);
    }

    #[test]
    fn test_total_delta_needs_every_part() {
        assert_eq!(compute_total_delta(Some(1.0), Some(2.0), Some(3.0)), Some(6.0));
        assert_eq!(compute_total_delta(Some(1.0), None, Some(3.0)), None);
        assert_eq!(delta(Some(10.0), Some(4.0)), Some(6.0));
        assert_eq!(delta(Some(10.0), None), None);
    }

    #[test]
    fn test_dominance_partition_sums_to_hundred() {
        let total = 2.4e12;
        let btc = 1.25e12;
        let stable = 0.17e12;
        let alt = compute_alt_cap(total, btc, stable);
        let dom = compute_dominance(
            Some(total),
            Some(btc),
            Some(0.4e12),
            Some(stable),
            Some(alt),
            None,
        );

        let sum = dom.partition_sum().unwrap();
        assert!((sum - 100.0).abs() < 1e-9);
        assert!(dom.eth.unwrap() <= dom.alt.unwrap());
    }

    #[test]
    fn test_dominance_clamped_and_fallback() {
        let global = GlobalTotals {
            total_cap: 2e12,
            btc_dominance: Some(54.2),
            eth_dominance: Some(170.0),
        };
        let dom = compute_dominance(Some(1e12), None, None, Some(2e12), None, Some(&global));

        assert_eq!(dom.btc, Some(54.2));
        assert_eq!(dom.eth, Some(100.0));
        assert_eq!(dom.stable, Some(100.0));
        assert_eq!(dom.alt, None);

        let dom = compute_dominance(None, Some(1.0), Some(1.0), Some(1.0), Some(1.0), None);
        assert_eq!(dom, Dominance::default());
    }

    #[test]
    fn test_stable_delta_only_counts_matched_members() {
        let basket = ids(&["tether", "usd-coin", "dai"]);
        let mut reported = HashMap::new();
        reported.insert("tether".to_string(), 110e9 + 30e6);
        reported.insert("usd-coin".to_string(), 33e9 + 10e6);
        let now = BucketCaps::from_reported(&basket, reported);

        let mut prev = HashMap::new();
        prev.insert("tether".to_string(), sample(110e9));
        // usd-coin has no history; dai has history but no current cap
        prev.insert("dai".to_string(), sample(5e9));

        let result = stable_delta(&now, &prev);
        assert_eq!(result.matched, 1);
        assert!((result.delta.unwrap() - 30e6).abs() < 1e-3);
    }

    #[test]
    fn test_stable_delta_missing_member_keeps_sign() {
        // dai vanishes from the current batch; a naive sum would read -5B
        let basket = ids(&["tether", "dai"]);
        let mut reported = HashMap::new();
        reported.insert("tether".to_string(), 110e9 + 20e6);
        let now = BucketCaps::from_reported(&basket, reported);

        let mut prev = HashMap::new();
        prev.insert("tether".to_string(), sample(110e9));
        prev.insert("dai".to_string(), sample(5e9));

        let result = stable_delta(&now, &prev);
        assert!(result.delta.unwrap() > 0.0);
    }

    #[test]
    fn test_stable_delta_none_without_overlap() {
        let basket = ids(&["tether"]);
        let now = BucketCaps::unavailable(&basket);
        let mut prev = HashMap::new();
        prev.insert("tether".to_string(), sample(110e9));

        let result = stable_delta(&now, &prev);
        assert_eq!(result.delta, None);
        assert_eq!(result.matched, 0);
    }
}
