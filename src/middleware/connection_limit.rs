//! Connection limit middleware for WebSocket connections
//!
//! Enforces a global maximum number of WebSocket connections and a per-IP
//! limit. Only upgrade requests are counted.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use voice_relay_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/ws/{session_id}", get(ws_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::AppState;

/// Extension type to carry the client IP through to the handler
/// so the handler can release the connection when done.
#[derive(Clone, Copy, Debug)]
pub struct ClientIp(pub IpAddr);

fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Middleware that reserves a connection slot for WebSocket upgrades.
///
/// Rejects with 503 when the global limit is reached and 429 when the
/// caller's IP is at its limit. On success a [`ClientIp`] extension is
/// inserted; the handler releases the slot when the socket closes.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    let client_ip = addr.ip();
    match state.try_acquire_connection(client_ip) {
        Ok(()) => {
            request.extensions_mut().insert(ClientIp(client_ip));
            let response = next.run(request).await;
            // The handler only owns the slot once the upgrade succeeded
            if response.status() != axum::http::StatusCode::SWITCHING_PROTOCOLS {
                state.release_connection(client_ip);
            }
            response
        }
        Err(e) => {
            tracing::warn!(ip = %client_ip, "Rejecting connection: {}", e);
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::core::realtime::{OpenedSession, RealtimeError, RealtimeResult, SessionFactory};
    use async_trait::async_trait;
    use axum::{
        Router, extract::connect_info::MockConnectInfo, http::StatusCode, routing::get,
    };
    use std::net::Ipv4Addr;
    use tower::util::ServiceExt;

    struct UnavailableFactory;

    #[async_trait]
    impl SessionFactory for UnavailableFactory {
        async fn open(&self) -> RealtimeResult<OpenedSession> {
            Err(RealtimeError::NotConnected)
        }
    }

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/ws", get(|| async { StatusCode::SWITCHING_PROTOCOLS }))
            .route("/plain", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                connection_limit_middleware,
            ))
            .layer(MockConnectInfo(SocketAddr::from((
                Ipv4Addr::new(127, 0, 0, 1),
                4000,
            ))))
            .with_state(state)
    }

    fn upgrade_request(path: &str) -> Request<Body> {
        Request::builder()
            .uri(path)
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_per_ip_limit_returns_429() {
        let mut config = ServerConfig::default();
        config.max_connections_per_ip = 1;
        let state = AppState::with_factory(config, Arc::new(UnavailableFactory));

        let first = app(state.clone()).oneshot(upgrade_request("/ws")).await.unwrap();
        assert_eq!(first.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(state.ws_connection_count(), 1);

        let second = app(state.clone()).oneshot(upgrade_request("/ws")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(state.ws_connection_count(), 1);
    }

    #[tokio::test]
    async fn test_global_limit_returns_503() {
        let mut config = ServerConfig::default();
        config.max_websocket_connections = Some(0);
        let state = AppState::with_factory(config, Arc::new(UnavailableFactory));

        let response = app(state).oneshot(upgrade_request("/ws")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_failed_upgrade_releases_slot() {
        let state = AppState::with_factory(ServerConfig::default(), Arc::new(UnavailableFactory));

        let response = app(state.clone())
            .oneshot(upgrade_request("/plain"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_plain_requests_are_not_counted() {
        let mut config = ServerConfig::default();
        config.max_websocket_connections = Some(0);
        let state = AppState::with_factory(config, Arc::new(UnavailableFactory));

        let request = Request::builder().uri("/plain").body(Body::empty()).unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
