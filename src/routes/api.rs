use axum::{Router, handler::HandlerWithoutStateExt, routing::get};
use std::path::Path;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::handlers::{api, static_files};
use crate::state::AppState;

/// Create the HTTP router: client page, health check and static assets
pub fn create_api_router(static_dir: &Path) -> Router<Arc<AppState>> {
    let assets = ServeDir::new(static_dir).not_found_service(static_files::not_found.into_service());

    Router::new()
        .route("/", get(static_files::index))
        .route("/health", get(api::health_check))
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
}
