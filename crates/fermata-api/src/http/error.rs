//! Application error type mapping to HTTP status codes and envelope format.
//!
//! `AlreadyUsed` maps to 410 rather than 404 so clients can render a
//! distinct "link already used" state.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use fermata_core::resume::ResumeError;
use fermata_infra::webhook::WebhookError;
use fermata_types::error::RepositoryError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Resume pipeline errors.
    Resume(ResumeError),
    /// Webhook verification failures.
    Webhook(WebhookError),
    /// Authentication failure.
    Unauthorized(String),
    /// Validation error.
    Validation(String),
    /// Resource not found.
    NotFound(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ResumeError> for AppError {
    fn from(e: ResumeError) -> Self {
        AppError::Resume(e)
    }
}

impl From<WebhookError> for AppError {
    fn from(e: WebhookError) -> Self {
        AppError::Webhook(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => AppError::NotFound("Paused execution not found".into()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Resume(ResumeError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Resume(ResumeError::NotFound) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Paused execution not found".to_string(),
            ),
            AppError::Resume(ResumeError::AlreadyUsed) => (
                StatusCode::GONE,
                "ALREADY_USED",
                "Approval link already used".to_string(),
            ),
            AppError::Resume(ResumeError::DeployedContextRequired) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Webhook resume requires a deployed execution".to_string(),
            ),
            AppError::Resume(e) => (StatusCode::INTERNAL_SERVER_ERROR, "RESUME_ERROR", e.to_string()),
            AppError::Webhook(WebhookError::MissingAuth(msg)) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                format!("Missing webhook authentication: {msg}"),
            ),
            AppError::Webhook(e) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                format!("Webhook authentication failed: {e}"),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone()),
        };

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
