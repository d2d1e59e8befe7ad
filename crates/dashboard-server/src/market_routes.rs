use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use liquidity_core::{Candle, CandleInterval, TickerStats};
use serde::{Deserialize, Serialize};
use technical_analysis::CandleAnalysis;

use crate::config::MAX_CANDLE_LIMIT;
use crate::{ApiResponse, AppError, AppState};

const MAX_SYMBOLS: usize = 20;

#[derive(Deserialize)]
pub struct TickersQuery {
    pub symbols: Option<String>,
}

#[derive(Deserialize)]
pub struct CandlesQuery {
    pub symbol: Option<String>,
    pub interval: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct CandlesResponse {
    pub symbol: String,
    pub interval: CandleInterval,
    pub candles: Vec<Candle>,
    pub analysis: CandleAnalysis,
}

pub fn market_routes() -> Router<AppState> {
    Router::new()
        .route("/api/market/tickers", get(get_tickers))
        .route("/api/market/candles", get(get_candles))
}

/// Exchange symbols are upper-case ASCII alphanumerics, e.g. `BTCUSDT`
fn normalize_symbol(raw: &str) -> Result<String, AppError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty()
        || symbol.len() > 20
        || !symbol.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(AppError::bad_request(format!("invalid symbol '{}'", raw.trim())));
    }
    Ok(symbol)
}

async fn get_tickers(
    State(state): State<AppState>,
    Query(query): Query<TickersQuery>,
) -> Result<Json<ApiResponse<Vec<TickerStats>>>, AppError> {
    let symbols: Vec<String> = match &query.symbols {
        Some(raw) => raw
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(normalize_symbol)
            .collect::<Result<_, _>>()?,
        None => state.config.ticker_symbols.clone(),
    };

    if symbols.is_empty() {
        return Err(AppError::bad_request("no symbols requested"));
    }
    if symbols.len() > MAX_SYMBOLS {
        return Err(AppError::bad_request(format!("at most {} symbols per request", MAX_SYMBOLS)));
    }

    let tickers = state.analyzer.fetch_tickers(&symbols).await;
    if tickers.is_empty() {
        return Err(AppError::with_status(
            StatusCode::SERVICE_UNAVAILABLE,
            anyhow::anyhow!("no ticker data available for {}", symbols.join(",")),
        ));
    }

    Ok(Json(ApiResponse::success(tickers)))
}

async fn get_candles(
    State(state): State<AppState>,
    Query(query): Query<CandlesQuery>,
) -> Result<Json<ApiResponse<CandlesResponse>>, AppError> {
    let symbol = match &query.symbol {
        Some(raw) => normalize_symbol(raw)?,
        None => state.config.default_symbol.clone(),
    };
    let interval = match &query.interval {
        Some(raw) => raw.parse::<CandleInterval>().map_err(AppError::bad_request)?,
        None => state.config.candle_interval,
    };
    let limit = query.limit.unwrap_or(state.config.candle_limit);
    if limit == 0 || limit > MAX_CANDLE_LIMIT {
        return Err(AppError::bad_request(format!(
            "limit must be between 1 and {}",
            MAX_CANDLE_LIMIT
        )));
    }

    let candles = state
        .analyzer
        .source()
        .fetch_ohlcv(&symbol, interval, limit)
        .await
        .map_err(|e| AppError::upstream("candles", e))?;

    let analysis = CandleAnalysis::from_candles(&candles, state.config.mfi_period);

    Ok(Json(ApiResponse::success(CandlesResponse {
        symbol,
        interval,
        candles,
        analysis,
    })))
}
