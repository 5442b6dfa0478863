//! HTTP control/inspection surface.
//!
//! Reads return projections of the engine's state tree; writes are limited
//! to the small command set the engine accepts. Handlers talk to the engine
//! over its event channel with oneshot replies, so every mutation goes
//! through the same serialized pipeline as the ticks.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::notify::Notifier;
use crate::types::{ControlCommand, EngineEvent, EngineStateView, RunState};

/// Shared state for the control surface.
pub struct AppState {
    pub events_tx: mpsc::Sender<EngineEvent>,
    pub notifier: Notifier,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(get_state))
        .route("/markets", get(get_markets))
        .route("/orders", get(get_orders))
        .route("/history", get(get_history))
        .route("/banned", get(get_banned).delete(clear_bans))
        .route("/banned/{market}", delete(clear_ban).put(set_ban))
        .route("/results", get(get_results))
        .route("/settings", get(get_settings))
        .route("/settings/{name}", put(set_setting))
        .route("/balances", get(get_balances))
        .route("/run-state", put(set_run_state))
        .route("/muted", put(set_muted))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Fetch the full state tree from the engine.
async fn fetch_state(state: &AppState) -> Result<EngineStateView, StatusCode> {
    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .events_tx
        .send(EngineEvent::Control(ControlCommand::GetState(reply_tx)))
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    reply_rx.await.map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn health() -> &'static str {
    "ok"
}

async fn get_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match fetch_state(&state).await {
        Ok(view) => (StatusCode::OK, Json(serde_json::json!(view))),
        Err(status) => (status, Json(serde_json::json!({"error": "engine unavailable"}))),
    }
}

macro_rules! section_handler {
    ($name:ident, $field:ident) => {
        async fn $name(State(state): State<Arc<AppState>>) -> impl IntoResponse {
            match fetch_state(&state).await {
                Ok(view) => (StatusCode::OK, Json(serde_json::json!(view.$field))),
                Err(status) => (
                    status,
                    Json(serde_json::json!({"error": "engine unavailable"})),
                ),
            }
        }
    };
}

section_handler!(get_markets, markets);
section_handler!(get_orders, orders);
section_handler!(get_history, history);
section_handler!(get_banned, banned);
section_handler!(get_results, results);
section_handler!(get_settings, settings);
section_handler!(get_balances, balances);

async fn clear_bans(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state
        .events_tx
        .send(EngineEvent::Control(ControlCommand::ClearBans))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn clear_ban(
    State(state): State<Arc<AppState>>,
    Path(market): Path<String>,
) -> impl IntoResponse {
    let (reply_tx, reply_rx) = oneshot::channel();
    let sent = state
        .events_tx
        .send(EngineEvent::Control(ControlCommand::ClearBan {
            market,
            reply: reply_tx,
        }))
        .await;
    if sent.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    match reply_rx.await {
        Ok(true) => StatusCode::NO_CONTENT,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn set_ban(
    State(state): State<Arc<AppState>>,
    Path(market): Path<String>,
    Json(count): Json<u32>,
) -> impl IntoResponse {
    match state
        .events_tx
        .send(EngineEvent::Control(ControlCommand::SetBan { market, count }))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn set_setting(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(value): Json<f64>,
) -> impl IntoResponse {
    let (reply_tx, reply_rx) = oneshot::channel();
    let sent = state
        .events_tx
        .send(EngineEvent::Control(ControlCommand::SetSetting {
            name,
            value,
            reply: reply_tx,
        }))
        .await;
    if sent.is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "engine unavailable"})),
        );
    }

    match reply_rx.await {
        Ok(Ok(())) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))),
        Ok(Err(reason)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": reason})),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "engine unavailable"})),
        ),
    }
}

async fn set_run_state(
    State(state): State<Arc<AppState>>,
    Json(run_state): Json<RunState>,
) -> impl IntoResponse {
    match state
        .events_tx
        .send(EngineEvent::Control(ControlCommand::SetRunState(run_state)))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn set_muted(
    State(state): State<Arc<AppState>>,
    Json(muted): Json<bool>,
) -> impl IntoResponse {
    match state
        .events_tx
        .send(EngineEvent::Control(ControlCommand::SetMuted(muted)))
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Forward notification events to the client as JSON until it disconnects.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.notifier.subscribe();

    loop {
        match rx.recv().await {
            Ok(event) => {
                let Ok(json) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }

    info!("WebSocket client disconnected");
}
