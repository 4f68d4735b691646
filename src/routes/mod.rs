pub mod api;
pub mod realtime;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Assemble every route around `state`.
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// connection limit middleware needs the peer address.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(realtime::create_realtime_router(state.clone()))
        .merge(api::create_api_router(&state.config.static_dir))
        .with_state(state)
}
