//! Execution-scoped handlers: approval resume, pause detail, wait cancel.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde_json::json;
use uuid::Uuid;

use fermata_core::repository::pause::PauseStore;
use fermata_core::repository::wait::WaitRegistry;
use fermata_core::resume::ApprovalDecision;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/executions/:execution_id/approve/:token
///
/// Human approve/reject decision against a one-time approval link. No API
/// key required: possession of the unguessable token is the credential.
/// A replayed link gets 410.
pub async fn approve_execution(
    State(state): State<AppState>,
    Path((execution_id, token)): Path<(Uuid, Uuid)>,
    Json(decision): Json<ApprovalDecision>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    tracing::info!(
        execution_id = %execution_id,
        approved = decision.approved,
        "approval decision received"
    );

    let outcome = state.coordinator.resume_with_approval(token, decision).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let result = serde_json::to_value(&outcome.result)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(ApiResponse::success(result, request_id, elapsed)))
}

/// GET /api/v1/executions/:execution_id/paused
///
/// Pause detail for UI polling: where the execution is parked, how it
/// resumes, and the logs accumulated so far. The serialized context is
/// deliberately not exposed.
pub async fn get_paused_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let paused = state
        .store
        .load(&execution_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Paused execution not found".into()))?;

    let detail = json!({
        "execution_id": paused.execution_id,
        "workflow_id": paused.workflow_id,
        "workspace_id": paused.workspace_id,
        "block_id": paused.metadata.block_id,
        "block_name": paused.metadata.block_name,
        "trigger": paused.metadata.trigger,
        "mode": paused.metadata.mode,
        "is_deployed_context": paused.metadata.is_deployed_context,
        "parent_execution": paused.metadata.parent_execution,
        "paused_at": paused.metadata.paused_at,
        "created_at": paused.created_at,
        "updated_at": paused.updated_at,
        "logs": paused.metadata.block_logs,
    });

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(detail, request_id, elapsed).with_link(
        "self",
        &format!("/api/v1/executions/{execution_id}/paused"),
    );
    Ok(Json(resp))
}

/// POST /api/v1/executions/:execution_id/cancel
///
/// Cancel a registered synchronous wait. The waiter wakes with the
/// timeout sentinel and the execution proceeds down its cancel path.
pub async fn cancel_execution(
    State(state): State<AppState>,
    Path(execution_id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let cancelled = state
        .registry
        .cancel_wait(&execution_id)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    if cancelled {
        tracing::info!(execution_id = %execution_id, "synchronous wait cancelled");
    }

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        json!({ "cancelled": cancelled }),
        request_id,
        elapsed,
    )))
}
