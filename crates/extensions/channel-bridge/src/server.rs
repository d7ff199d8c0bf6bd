//! HTTP server and routing.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::frame::{ClientRole, ConnectParams};
use crate::{BridgeState, Connection};

/// Create the Axum router for the bridge.
pub fn create_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<BridgeState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn handle_socket(socket: WebSocket, params: ConnectParams, state: Arc<BridgeState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    debug!(
        "New {:?} connection {} (tab {:?})",
        params.role, conn_id, params.tab_id
    );
    Connection::open(conn_id, params, socket, state);
}

async fn health_check(State(state): State<Arc<BridgeState>>) -> impl IntoResponse {
    let status = if state.started.load(Ordering::SeqCst) {
        "ok"
    } else {
        "starting"
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "status": status,
            "connections": state.connections.len(),
            "pages": state.count(ClientRole::Page),
            "surfaces": state.count(ClientRole::Surface),
            "host": state.count(ClientRole::Host) > 0,
            "handler": state.handler().is_some(),
        })
        .to_string(),
    )
}
