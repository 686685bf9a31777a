//! AI-text detection endpoint (/text)

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use std::sync::Arc;

use crate::AppState;
use crate::models::{TextClassificationResponse, TextRequest};
use crate::services::error::{ApiFailure, LogErr, failure};

pub const NO_TEXT: &str = "No text provided";
pub const MODEL_UNAVAILABLE: &str = "Text classification model is not loaded.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/text", post(classify_text))
}

/// POST /text - Classify a snippet as student-written or AI-generated
async fn classify_text(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<TextClassificationResponse>, ApiFailure> {
    let text = match payload {
        Ok(Json(request)) => request.text.unwrap_or_default(),
        Err(rejection) => {
            log::debug!("[text] Unreadable body: {rejection}");
            String::new()
        }
    };
    if text.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, NO_TEXT));
    }

    let classifier = state
        .text
        .clone()
        .ok_or_else(|| failure(StatusCode::SERVICE_UNAVAILABLE, MODEL_UNAVAILABLE))?;

    let label = tokio::task::spawn_blocking(move || classifier.classify(&text))
        .await
        .log_500("Classification task failed")?
        .log_500("Failed to classify text")?;

    log::info!("[text] {}", label.as_str());
    Ok(Json(TextClassificationResponse {
        classification: label.as_str().to_string(),
    }))
}
