//! Realtime WebSocket route configuration

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::realtime::ws_handler;
use crate::middleware::connection_limit_middleware;
use crate::state::AppState;

/// Create the Realtime WebSocket router
///
/// # Endpoint
///
/// `GET /ws/{session_id}` - WebSocket upgrade bridged to a realtime session
///
/// # Protocol
///
/// Clients send `{"type": "audio", "data": [int16, ...]}` frames. The server
/// sends one JSON text frame per session event.
///
/// Connection limits are enforced per IP and globally; the handler releases
/// its slot when the socket closes.
pub fn create_realtime_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/{session_id}", get(ws_handler))
        .layer(axum::middleware::from_fn_with_state(
            state,
            connection_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
