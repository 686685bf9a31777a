pub mod predict;
pub mod text;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::AppState;
use crate::constants::MAX_UPLOAD_SIZE;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(predict::routes())
        .merge(text::routes())
}

/// Full application: routes, upload limit and CORS for any origin.
pub fn build_app(state: Arc<AppState>) -> Router {
    build_routes()
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
