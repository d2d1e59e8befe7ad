#[cfg(test)]
mod tests {
    use super::super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration as ChronoDuration, Utc};
    use liquidity_core::{Candle, CandleInterval, CapSample, GlobalTotals, TickerStats};
    use serde_json::Value;
    use std::collections::HashMap;
    use tower::ServiceExt;

    /// Static market: every asset gained 1% over the last two days
    struct StaticMarket;

    #[async_trait]
    impl MarketDataSource for StaticMarket {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch_global(&self) -> Result<GlobalTotals, MarketDataError> {
            Ok(GlobalTotals {
                total_cap: 2.4e12,
                btc_dominance: Some(52.0),
                eth_dominance: Some(16.0),
            })
        }

        async fn fetch_caps(
            &self,
            ids: &[String],
        ) -> Result<HashMap<String, f64>, MarketDataError> {
            let known = [("bitcoin", 1.25e12), ("ethereum", 0.4e12), ("tether", 110e9)];
            Ok(known
                .iter()
                .filter(|(id, _)| ids.iter().any(|i| i == id))
                .map(|(id, cap)| (id.to_string(), *cap))
                .collect())
        }

        async fn fetch_history(
            &self,
            asset_id: &str,
            _lookback_minutes: u32,
        ) -> Result<Vec<CapSample>, MarketDataError> {
            let cap = match asset_id {
                "bitcoin" => 1.25e12,
                "ethereum" => 0.4e12,
                "tether" => 110e9,
                other => {
                    return Err(MarketDataError::DataUnavailable(format!(
                        "no history for {other}"
                    )))
                }
            };
            Ok(vec![CapSample {
                timestamp: Utc::now() - ChronoDuration::days(2),
                cap: cap / 1.01,
            }])
        }

        async fn fetch_ticker_24h(&self, symbol: &str) -> Result<TickerStats, MarketDataError> {
            Ok(TickerStats {
                symbol: symbol.to_string(),
                last_price: Some(100.0),
                price_change_percent: Some(1.0),
                quote_volume: Some(1e9),
            })
        }

        async fn fetch_ohlcv(
            &self,
            _symbol: &str,
            _interval: CandleInterval,
            _limit: u32,
        ) -> Result<Vec<Candle>, MarketDataError> {
            Err(MarketDataError::Network("static klines: HTTP 502".to_string()))
        }
    }

    fn test_state() -> AppState {
        let config = DashboardConfig::from_lookup(|_| None).unwrap();
        AppState::new(config, Arc::new(StaticMarket))
    }

    async fn send(
        state: &AppState,
        request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value,
    ) {
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_sets_request_id_and_security_headers() {
        let state = test_state();
        let (status, headers, body) = send(&state, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(headers.contains_key("x-request-id"));
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["cache-control"], "no-store");
    }

    #[tokio::test]
    async fn test_incoming_request_id_is_echoed() {
        let state = test_state();
        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let (_, headers, _) = send(&state, request).await;

        assert_eq!(headers["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn test_unsupported_window_is_bad_request() {
        let state = test_state();
        let (status, _, body) = send(&state, get("/api/liquidity?window=30")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("unsupported lookback window"));
    }

    #[tokio::test]
    async fn test_liquidity_computes_and_records_history() {
        let state = test_state();
        let (status, _, body) = send(&state, get("/api/liquidity")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["window"], 60);
        assert_eq!(body["data"]["tickers"].as_array().unwrap().len(), 2);
        assert!(state.reports.contains_key(&60));

        let (_, _, history) = send(&state, get("/api/liquidity/history")).await;
        assert_eq!(history["data"]["capacity"], 200);
        assert_eq!(history["data"]["entries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_other_window_is_cached_but_not_recorded() {
        let state = test_state();
        let request = post_json("/api/liquidity/refresh?window=240", "");
        let (status, _, body) = send(&state, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["window_label"], "4 hours");
        assert!(state.reports.contains_key(&240));
        assert!(state.history.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_broadcasts_report() {
        let state = test_state();
        let mut rx = state.updates.subscribe();

        send(&state, post_json("/api/liquidity/refresh", "")).await;

        let report = rx.recv().await.unwrap();
        assert_eq!(report.window, state.config.window);
    }

    #[tokio::test]
    async fn test_auto_refresh_toggle() {
        let state = test_state();
        assert!(state.auto_refresh_enabled());

        let request = post_json("/api/liquidity/auto-refresh", r#"{"enabled": false}"#);
        let (status, _, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["enabled"], false);
        assert!(!state.auto_refresh_enabled());

        let (_, _, body) = send(&state, get("/api/liquidity/auto-refresh")).await;
        assert_eq!(body["data"]["enabled"], false);
        assert_eq!(body["data"]["refresh_interval_ms"], 15000);
    }

    #[tokio::test]
    async fn test_config_endpoint() {
        let state = test_state();
        let (status, _, body) = send(&state, get("/api/config")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["window_minutes"], 60);
        assert_eq!(body["data"]["tolerance"]["mode"], "relative");
        assert_eq!(body["data"]["cap_source"], "coingecko");
    }

    #[tokio::test]
    async fn test_tickers_validate_symbols() {
        let state = test_state();

        let (status, _, _) = send(&state, get("/api/market/tickers?symbols=BTC-USD")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let request = get("/api/market/tickers?symbols=btcusdt,solusdt");
        let (status, _, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][1]["symbol"], "SOLUSDT");
    }

    #[tokio::test]
    async fn test_candles_upstream_failure_is_503() {
        let state = test_state();

        let request = get("/api/market/candles?symbol=BTCUSDT&interval=1h&limit=50");
        let (status, _, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("HTTP 502"));

        let (status, _, _) = send(&state, get("/api/market/candles?interval=2h")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(&state, get("/api/market/candles?limit=5000")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
