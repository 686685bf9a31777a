//! Error handling utilities for route handlers

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

/// JSON error body: `{"error": "..."}`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Rejection returned by every handler
pub type ApiFailure = (StatusCode, Json<ErrorResponse>);

pub fn failure(status: StatusCode, message: impl Into<String>) -> ApiFailure {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Extension trait for logging errors and converting to an [`ApiFailure`]
pub trait LogErr<T> {
    /// Log error with context and return INTERNAL_SERVER_ERROR
    fn log_500(self, context: &str) -> Result<T, ApiFailure>;

    /// Log error with context and return a custom status
    fn log_status(self, context: &str, status: StatusCode) -> Result<T, ApiFailure>;
}

impl<T, E: std::fmt::Display> LogErr<T> for Result<T, E> {
    fn log_500(self, context: &str) -> Result<T, ApiFailure> {
        self.log_status(context, StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn log_status(self, context: &str, status: StatusCode) -> Result<T, ApiFailure> {
        self.map_err(|e| {
            log::error!("{context}: {e:#}");
            failure(status, context)
        })
    }
}
