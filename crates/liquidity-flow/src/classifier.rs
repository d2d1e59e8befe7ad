//! Flow Classifier
//!
//! Maps a [`DeltaSet`] to a named verdict. Pure and total: every input,
//! including NaN or missing deltas, yields exactly one verdict.

use liquidity_core::{Bucket, DeltaSet, FlowKind, Verdict};

/// Classify the direction of liquidity flow.
///
/// Rules are evaluated in order and the first match wins:
/// 1. any bucket delta missing -> insufficient data
/// 2. net inflow or outflow beyond `tolerance` (when the total is known)
/// 3. rotation between buckets
/// 4. neutral
pub fn classify(deltas: &DeltaSet, tolerance: f64) -> Verdict {
    Verdict::from(classify_kind(deltas, tolerance))
}

pub fn classify_kind(deltas: &DeltaSet, tolerance: f64) -> FlowKind {
    let tol = if tolerance.is_finite() { tolerance.abs() } else { 0.0 };

    let Some(buckets) = deltas.bucket_deltas() else {
        return FlowKind::InsufficientData;
    };
    if buckets.iter().any(|(_, v)| !v.is_finite()) {
        return FlowKind::InsufficientData;
    }
    let [(_, d_btc), (_, d_eth), (_, d_alt), (_, d_stable)] = buckets;

    if let Some(d_total) = deltas.d_total.filter(|v| v.is_finite()) {
        if d_total > tol {
            return match leader(&buckets) {
                Bucket::Stables => FlowKind::InflowIntoStables,
                leader => FlowKind::Inflow { leader },
            };
        }
        if d_total < -tol {
            return if d_stable > tol {
                FlowKind::OutflowToStables
            } else {
                FlowKind::Outflow
            };
        }
    }

    if d_btc > tol && d_alt < -tol {
        return FlowKind::RotationAltsToBtc;
    }
    if d_alt > tol && d_btc < -tol {
        return FlowKind::RotationBtcToAlts;
    }
    if d_eth > tol && d_btc <= tol && d_alt <= tol {
        return FlowKind::EthConcentration;
    }
    if d_stable > tol && d_btc.max(d_eth).max(d_alt) <= tol {
        return FlowKind::StableIndecision;
    }

    FlowKind::Neutral
}

/// Bucket with the largest delta; earlier buckets win ties
fn leader(buckets: &[(Bucket, f64); 4]) -> Bucket {
    let mut best = buckets[0];
    for &(bucket, value) in &buckets[1..] {
        if value > best.1 {
            best = (bucket, value);
        }
    }
    best.0
}
