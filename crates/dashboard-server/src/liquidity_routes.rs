//! Liquidity API Routes
//!
//! Latest flow report, manual refresh, history and auto-refresh control.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use liquidity_core::{HistoryEntry, LookbackWindow};
use liquidity_flow::RefreshReport;
use serde::{Deserialize, Serialize};

use crate::config::ConfigView;
use crate::request_id::RequestId;
use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct WindowQuery {
    pub window: Option<u32>,
}

impl WindowQuery {
    fn resolve(&self, default: LookbackWindow) -> Result<LookbackWindow, AppError> {
        match self.window {
            Some(minutes) => LookbackWindow::try_from(minutes).map_err(AppError::bad_request),
            None => Ok(default),
        }
    }
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub window_minutes: u32,
    pub capacity: usize,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Deserialize)]
pub struct AutoRefreshRequest {
    pub enabled: bool,
}

#[derive(Serialize)]
pub struct AutoRefreshResponse {
    pub enabled: bool,
    pub refresh_interval_ms: u64,
}

pub fn liquidity_routes() -> Router<AppState> {
    Router::new()
        .route("/api/liquidity", get(get_liquidity))
        .route("/api/liquidity/refresh", post(refresh_liquidity))
        .route("/api/liquidity/history", get(get_history))
        .route("/api/liquidity/auto-refresh", get(get_auto_refresh).post(set_auto_refresh))
        .route("/api/config", get(get_config))
}

/// Latest report for a window.
///
/// The configured window is served from the refresh loop's cache; other
/// windows are reused while younger than one refresh interval.
async fn get_liquidity(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<ApiResponse<RefreshReport>>, AppError> {
    let window = query.resolve(state.config.window)?;

    let cached = state.reports.get(&window.minutes()).map(|r| r.value().clone());
    if let Some(report) = cached {
        let age = Utc::now().signed_duration_since(report.generated_at);
        let max_age = chrono::Duration::from_std(state.config.refresh_interval)
            .unwrap_or(chrono::Duration::zero());
        if window == state.config.window || age <= max_age {
            return Ok(Json(ApiResponse::success(report)));
        }
    }

    Ok(Json(ApiResponse::success(state.refresh(window).await)))
}

async fn refresh_liquidity(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<ApiResponse<RefreshReport>>, AppError> {
    let window = query.resolve(state.config.window)?;
    tracing::info!("Manual refresh for {} window (request {})", window.label(), request_id);

    Ok(Json(ApiResponse::success(state.refresh(window).await)))
}

async fn get_history(State(state): State<AppState>) -> Json<ApiResponse<HistoryResponse>> {
    let history = state.history.read().await;

    Json(ApiResponse::success(HistoryResponse {
        window_minutes: state.config.window.minutes(),
        capacity: history.capacity(),
        entries: history.to_vec(),
    }))
}

async fn get_auto_refresh(State(state): State<AppState>) -> Json<ApiResponse<AutoRefreshResponse>> {
    Json(ApiResponse::success(AutoRefreshResponse {
        enabled: state.auto_refresh_enabled(),
        refresh_interval_ms: state.config.refresh_interval.as_millis() as u64,
    }))
}

async fn set_auto_refresh(
    State(state): State<AppState>,
    Json(body): Json<AutoRefreshRequest>,
) -> Json<ApiResponse<AutoRefreshResponse>> {
    state.set_auto_refresh(body.enabled);
    tracing::info!("Auto-refresh {}", if body.enabled { "resumed" } else { "paused" });

    Json(ApiResponse::success(AutoRefreshResponse {
        enabled: body.enabled,
        refresh_interval_ms: state.config.refresh_interval.as_millis() as u64,
    }))
}

async fn get_config(State(state): State<AppState>) -> Json<ApiResponse<ConfigView>> {
    Json(ApiResponse::success(state.config.view()))
}
