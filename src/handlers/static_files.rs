//! Browser client assets.

use axum::{extract::State, response::Html};
use std::io::ErrorKind;
use std::sync::Arc;

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Serve `index.html` from the static directory.
pub async fn index(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    let path = state.config.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => Ok(Html(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(AppError::NotFound("index.html not found".to_string()))
        }
        Err(e) => Err(AppError::Internal(format!(
            "Failed to read {}: {e}",
            path.display()
        ))),
    }
}

/// JSON 404 for static assets that do not exist.
pub async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}
