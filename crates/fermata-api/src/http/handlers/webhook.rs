//! Webhook resume handler.
//!
//! Verifies the configured shared secret or HMAC signature against the raw
//! request body before handing the payload to the resume coordinator.

use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use uuid::Uuid;

use fermata_core::repository::pause::PauseStore;
use fermata_infra::webhook::{
    RESUME_SECRET_HEADER, SIGNATURE_HEADER, verify_hmac_sha256_with_prefix, verify_resume_secret,
};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/webhooks/resume/:workflow_id/:execution_id
///
/// Receive an external webhook that resumes a paused execution. When the
/// stored pause carries a webhook secret, the request must present it in
/// `X-Resume-Secret` (constant-time equality) or sign the body with
/// HMAC-SHA256 in `X-Hub-Signature-256`.
///
/// An execution can also be waiting synchronously in the registry without
/// a pause row yet; those requests pass straight to the coordinator, which
/// delivers the signal or reports not-found.
pub async fn webhook_resume(
    State(state): State<AppState>,
    Path((workflow_id, execution_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    if let Some(paused) = state.store.load(&execution_id).await?
        && let Some(secret) = &paused.metadata.webhook_secret
    {
        verify_webhook_auth(secret, &headers, &body)?;
    }

    // Best-effort body parse; non-JSON bodies resume with a null payload
    let payload: serde_json::Value =
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);

    tracing::info!(
        workflow_id = %workflow_id,
        execution_id = %execution_id,
        "webhook resume received"
    );

    let outcome = state
        .coordinator
        .resume_with_webhook(workflow_id, execution_id, payload)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let result = serde_json::to_value(&outcome.result)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(ApiResponse::success(result, request_id, elapsed)))
}

fn verify_webhook_auth(
    secret: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<(), AppError> {
    let provided_secret = headers
        .get(RESUME_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    if provided_secret.is_some() {
        verify_resume_secret(secret, provided_secret)?;
        return Ok(());
    }
    if let Some(sig) = signature {
        verify_hmac_sha256_with_prefix(secret.as_bytes(), body, sig)?;
        return Ok(());
    }
    Err(AppError::Unauthorized(format!(
        "Webhook requires '{RESUME_SECRET_HEADER}' or '{SIGNATURE_HEADER}' header"
    )))
}
