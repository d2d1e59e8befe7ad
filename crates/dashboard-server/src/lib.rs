//! Liquidity dashboard server
//!
//! Serves liquidity reports over JSON and WebSocket, and keeps them fresh
//! with a background refresh loop.

pub mod config;
pub mod format;
mod liquidity_routes;
mod market_routes;
mod request_id;
mod security_headers;
mod ws_routes;

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dashmap::DashMap;
use liquidity_core::{DeltaHistory, LookbackWindow, MarketDataError, MarketDataSource};
use liquidity_flow::{LiquidityAnalyzer, RefreshReport};
use market_data_client::CompositeSource;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::DashboardConfig;

/// Shared server state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub analyzer: Arc<LiquidityAnalyzer>,
    /// Time series of refreshes for the configured window
    pub history: Arc<RwLock<DeltaHistory>>,
    /// Latest report per window, keyed by minutes
    pub reports: Arc<DashMap<u32, RefreshReport>>,
    pub updates: broadcast::Sender<RefreshReport>,
    pub auto_refresh: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: DashboardConfig, source: Arc<dyn MarketDataSource>) -> Self {
        let analyzer = LiquidityAnalyzer::new(source, config.liquidity_config());
        let (updates, _) = broadcast::channel(64);

        Self {
            history: Arc::new(RwLock::new(DeltaHistory::new(config.history_capacity))),
            reports: Arc::new(DashMap::new()),
            updates,
            auto_refresh: Arc::new(AtomicBool::new(config.auto_refresh)),
            analyzer: Arc::new(analyzer),
            config: Arc::new(config),
        }
    }

    /// Run a refresh for `window` and publish it
    pub async fn refresh(&self, window: LookbackWindow) -> RefreshReport {
        let report = self.analyzer.refresh(window).await;

        if window == self.config.window {
            self.history.write().await.push(report.history_entry());
        }
        self.reports.insert(window.minutes(), report.clone());
        // No subscribers is fine
        let _ = self.updates.send(report.clone());

        report
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.auto_refresh.load(Ordering::Relaxed)
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.auto_refresh.store(enabled, Ordering::Relaxed);
    }
}

/// Standard JSON envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler error carrying the HTTP status to answer with
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(message.into()))
    }

    /// Upstream market data failure
    pub fn upstream(context: &str, e: MarketDataError) -> Self {
        Self::with_status(StatusCode::SERVICE_UNAVAILABLE, anyhow::anyhow!("{context}: {e}"))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed ({}): {:#}", self.status, self.error);
        } else {
            tracing::warn!("Request rejected ({}): {:#}", self.status, self.error);
        }

        let body = ApiResponse::<()>::error(format!("{:#}", self.error));
        (self.status, Json(body)).into_response()
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "liquidity-dashboard",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .merge(liquidity_routes::liquidity_routes())
        .merge(market_routes::market_routes())
        .merge(ws_routes::ws_routes())
        .layer(middleware::from_fn(security_headers::security_headers_middleware))
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .layer(cors)
        .with_state(state)
}

/// Initialize tracing; `RUST_LOG_FORMAT=json` switches to JSON lines
pub fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

/// Market data source wired from the configured providers
pub fn build_source(config: &DashboardConfig) -> Arc<dyn MarketDataSource> {
    let source = CompositeSource::from_kinds(
        config.cap_source,
        config.ticker_source,
        config.candle_source,
        &config.providers,
    );
    let (caps, tickers, candles) = source.providers();
    tracing::info!("Data sources: caps={}, tickers={}, candles={}", caps, tickers, candles);
    Arc::new(source)
}

/// Periodic refresh of the configured window; skips ticks while paused
async fn refresh_loop(state: AppState) {
    let mut interval = tokio::time::interval(state.config.refresh_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if !state.auto_refresh_enabled() {
            tracing::debug!("Auto-refresh paused, skipping tick");
            continue;
        }
        state.refresh(state.config.window).await;
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = DashboardConfig::from_env()?;
    tracing::info!(
        "Starting liquidity dashboard (window: {}, refresh every {}ms, auto-refresh: {})",
        config.window.label(),
        config.refresh_interval.as_millis(),
        config.auto_refresh
    );

    let source = build_source(&config);
    let addr = format!("{}:{}", config.bind_addr, config.port);
    let state = AppState::new(config, source);

    tokio::spawn(refresh_loop(state.clone()));

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod router_tests;
