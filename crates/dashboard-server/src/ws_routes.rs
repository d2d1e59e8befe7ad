use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

async fn ws_liquidity_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_liquidity_socket(socket, state))
}

/// Streams every new refresh report, starting with the latest cached one
async fn handle_liquidity_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.updates.subscribe();

    let latest = state
        .reports
        .get(&state.config.window.minutes())
        .map(|r| r.value().clone());
    if let Some(report) = latest {
        if let Ok(json) = serde_json::to_string(&report) {
            if sender.send(Message::Text(json)).await.is_err() {
                return;
            }
        }
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(report) => {
                    let Ok(json) = serde_json::to_string(&report) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("WebSocket client lagged, skipped {} reports", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Client messages are ignored; axum answers pings
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws/liquidity", get(ws_liquidity_handler))
}
