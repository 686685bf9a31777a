//! Deepfake detection endpoint (/predict)

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;
use crate::detection::{MediaKind, summarize};
use crate::models::PredictionResponse;
use crate::services::error::{ApiFailure, LogErr, failure};

pub const NO_FILE: &str = "No file provided.";
pub const EMPTY_FILENAME: &str = "Empty filename.";
pub const UNSUPPORTED_FORMAT: &str = "Unsupported file format. Please upload an image or video.";
pub const NO_FACES: &str = "No faces detected in the file.";
pub const MODEL_UNAVAILABLE: &str = "Deepfake detection model is not loaded.";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/predict", post(predict))
}

/// POST /predict - Score the faces in an uploaded image or video
/// Accepts multipart form data with a "file" field (.jpg/.jpeg/.png or .mp4/.avi/.mov)
async fn predict(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResponse>, ApiFailure> {
    let (file_name, body) = read_upload(&mut multipart)
        .await?
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, NO_FILE))?;
    let started = Instant::now();

    if file_name.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, EMPTY_FILENAME));
    }

    let kind = MediaKind::from_file_name(&file_name)
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, UNSUPPORTED_FORMAT))?;

    let analyzer = state
        .analyzer
        .clone()
        .ok_or_else(|| failure(StatusCode::SERVICE_UNAVAILABLE, MODEL_UNAVAILABLE))?;

    log::info!("[predict] {file_name}: {} bytes ({kind:?})", body.len());
    let name = file_name.clone();
    let scores = tokio::task::spawn_blocking(move || analyzer.analyze(kind, &name, &body))
        .await
        .log_500("Analysis task failed")?
        .log_500("Failed to analyze file")?;

    if scores.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, NO_FACES));
    }

    let response = summarize(&scores, started.elapsed());
    log::info!(
        "[predict] {file_name}: {} ({}%) over {} face(s) in {}s",
        response.prediction,
        response.confidence,
        response.total_faces_analyzed,
        response.processing_time
    );
    Ok(Json(response))
}

/// First "file" part that carries a filename, if any. Parts without a
/// filename are plain form values, not uploads.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<(String, Bytes)>, ApiFailure> {
    while let Some(field) = multipart
        .next_field()
        .await
        .log_status("Invalid multipart body", StatusCode::BAD_REQUEST)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let body = field
            .bytes()
            .await
            .log_status("Failed to read upload", StatusCode::BAD_REQUEST)?;
        return Ok(Some((file_name, body)));
    }
    Ok(None)
}
