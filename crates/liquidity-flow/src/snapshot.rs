//! Market Snapshot Builder
//!
//! Gathers current and historical capitalization for the tracked buckets
//! and turns them into a [`MarketSnapshot`] plus the [`DeltaSet`] for the
//! lookback window. Every upstream failure degrades the affected quantity
//! to `None`; a build never fails as a whole.
//!
//! Cap histories are cached per asset and window. A cached series answers
//! later builds until the cutoff moves past its newest sample, so a warm
//! refresh only fetches current totals and caps.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::future::join_all;
use liquidity_core::{
    last_sample_at_or_before, BucketCaps, CapSample, DeltaSet, GlobalTotals, LookbackWindow,
    MarketDataError, MarketDataSource, MarketSnapshot,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::config::SnapshotConfig;
use crate::metrics::{
    compute_alt_cap, compute_dominance, compute_total_delta, delta, estimate_alt_delta,
    stable_delta,
};

pub struct SnapshotBuilder {
    source: Arc<dyn MarketDataSource>,
    config: SnapshotConfig,
    /// Cap series keyed by (asset id, lookback minutes)
    history_cache: DashMap<(String, u32), Vec<CapSample>>,
}

/// A series can answer `cutoff` exactly when it has samples on both sides
fn series_covers(series: &[CapSample], cutoff: DateTime<Utc>) -> bool {
    let oldest = series.iter().map(|s| s.timestamp).min();
    let newest = series.iter().map(|s| s.timestamp).max();
    matches!((oldest, newest), (Some(o), Some(n)) if o <= cutoff && n >= cutoff)
}

impl SnapshotBuilder {
    pub fn new(source: Arc<dyn MarketDataSource>, config: SnapshotConfig) -> Self {
        Self {
            source,
            config,
            history_cache: DashMap::new(),
        }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Await `fut` within the fetch budget, logging and dropping failures
    async fn bounded<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, MarketDataError>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.config.fetch_timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!("{} unavailable: {}", what, e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "{} timed out after {}s",
                    what,
                    self.config.fetch_timeout.as_secs_f64()
                );
                None
            }
        }
    }

    pub async fn fetch_global_totals(&self) -> Option<GlobalTotals> {
        self.bounded("global totals", self.source.fetch_global()).await
    }

    /// Current caps for `ids` in one batched call
    pub async fn fetch_bucket_caps(&self, ids: &[String]) -> BucketCaps {
        match self.bounded("bucket caps", self.source.fetch_caps(ids)).await {
            Some(reported) => {
                let caps = BucketCaps::from_reported(ids, reported);
                if !caps.is_complete() {
                    tracing::warn!("No market cap reported for: {}", caps.missing.join(", "));
                }
                caps
            }
            None => BucketCaps::unavailable(ids),
        }
    }

    /// Last sample at or before `now - minutes_back`
    pub async fn fetch_historical_cap(
        &self,
        asset_id: &str,
        minutes_back: u32,
    ) -> Option<CapSample> {
        let cutoff = Utc::now() - chrono::Duration::minutes(i64::from(minutes_back));
        let key = (asset_id.to_string(), minutes_back);

        if let Some(series) = self.history_cache.get(&key) {
            if series_covers(&series, cutoff) {
                tracing::debug!("{} cap history served from cache", asset_id);
                return last_sample_at_or_before(&series, cutoff);
            }
        }

        let what = format!("{} cap history", asset_id);
        let series = self
            .bounded(&what, self.source.fetch_history(asset_id, minutes_back))
            .await?;
        if !series.is_empty() {
            self.history_cache.insert(key, series.clone());
        }

        let sample = last_sample_at_or_before(&series, cutoff);
        if sample.is_none() {
            tracing::warn!(
                "{}: no sample at or before {}",
                what,
                cutoff.format("%Y-%m-%d %H:%M UTC")
            );
        }
        sample
    }

    /// Snapshot now and deltas against `now - window`.
    ///
    /// All fetches run concurrently; each is bounded by the fetch timeout.
    pub async fn build(&self, window: LookbackWindow) -> (MarketSnapshot, DeltaSet) {
        let minutes = window.minutes();
        let cfg = &self.config;
        let core_ids = vec![cfg.btc_id.clone(), cfg.eth_id.clone()];

        tracing::info!(
            "Building liquidity snapshot (window: {}, stables: {})",
            window.label(),
            cfg.stable_ids.len()
        );

        let stable_history = join_all(cfg.stable_ids.iter().map(|id| async move {
            (id.clone(), self.fetch_historical_cap(id, minutes).await)
        }));

        let (global, core_caps, stable_caps, btc_prev, eth_prev, stable_prev) = tokio::join!(
            self.fetch_global_totals(),
            self.fetch_bucket_caps(&core_ids),
            self.fetch_bucket_caps(&cfg.stable_ids),
            self.fetch_historical_cap(&cfg.btc_id, minutes),
            self.fetch_historical_cap(&cfg.eth_id, minutes),
            stable_history,
        );

        let total_now = global.as_ref().map(|g| g.total_cap);
        let btc_now = core_caps.get(&cfg.btc_id);
        let eth_now = core_caps.get(&cfg.eth_id);
        let stable_now = stable_caps.present_sum();
        let alt_now = match (total_now, btc_now, stable_now) {
            (Some(total), Some(btc), Some(stable)) => Some(compute_alt_cap(total, btc, stable)),
            _ => None,
        };

        let snapshot = MarketSnapshot {
            timestamp: Utc::now(),
            total_cap: total_now,
            btc_cap: btc_now,
            eth_cap: eth_now,
            stable_cap: stable_now,
            alt_cap: alt_now,
            dominance: compute_dominance(
                total_now,
                btc_now,
                eth_now,
                stable_now,
                alt_now,
                global.as_ref(),
            ),
            stable_coverage: stable_caps.coverage(),
        };

        let prev_stables: HashMap<String, CapSample> = stable_prev
            .into_iter()
            .filter_map(|(id, sample)| sample.map(|s| (id, s)))
            .collect();
        let stables = stable_delta(&stable_caps, &prev_stables);

        let d_btc = delta(btc_now, btc_prev.map(|s| s.cap));
        let d_eth = delta(eth_now, eth_prev.map(|s| s.cap));
        let share = cfg.eth_share.measure(eth_now, alt_now);
        let d_alt = estimate_alt_delta(d_eth, share, &cfg.eth_share);
        let d_total = compute_total_delta(d_btc, stables.delta, d_alt);

        let deltas = DeltaSet {
            window_minutes: minutes,
            d_total,
            d_btc,
            d_eth,
            d_stable: stables.delta,
            d_alt,
            alt_estimated: true,
            stable_members_matched: stables.matched,
        };

        if !deltas.is_complete() {
            tracing::warn!(
                "Incomplete deltas for {} window (btc: {}, eth: {}, stables matched: {}/{})",
                window.label(),
                d_btc.is_some(),
                d_eth.is_some(),
                stables.matched,
                cfg.stable_ids.len()
            );
        }

        (snapshot, deltas)
    }
}
