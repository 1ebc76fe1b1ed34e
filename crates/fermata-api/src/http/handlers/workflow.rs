//! Workflow-scoped handlers: signed API resume and pause listing.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use fermata_core::repository::pause::PauseStore;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Query parameters for listing paused executions.
#[derive(Debug, Deserialize)]
pub struct ListPausedQuery {
    /// Narrow the listing to pauses at one wait block.
    pub block_id: Option<String>,
}

/// POST /api/v1/workflows/:workflow_id/executions/:execution_id/resume
///
/// Signed API resume. The JSON payload is validated against the wait
/// block's declared input schema before any state mutation. When the wait
/// block declares a response template, the resolved template body and
/// status are returned instead of the standard envelope.
pub async fn resume_execution(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path((workflow_id, execution_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let payload = match body {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        _ => {
            return Err(AppError::Validation(
                "Resume payload must be a JSON object".into(),
            ));
        }
    };

    let outcome = state
        .coordinator
        .resume_with_api(workflow_id, execution_id, payload)
        .await?;

    if let Some(template) = outcome.template {
        let status =
            StatusCode::from_u16(template.status).unwrap_or(StatusCode::OK);
        return Ok((status, Json(template.body)).into_response());
    }

    let elapsed = start.elapsed().as_millis() as u64;
    let result = serde_json::to_value(&outcome.result)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(ApiResponse::success(result, request_id, elapsed)).into_response())
}

/// GET /api/v1/workflows/:workflow_id/paused?block_id=
///
/// List live pauses for a workflow.
pub async fn list_paused(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(workflow_id): Path<Uuid>,
    Query(query): Query<ListPausedQuery>,
) -> Result<Json<ApiResponse<Vec<Value>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let summaries = state
        .store
        .list_for_workflow(&workflow_id, query.block_id.as_deref())
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let data: Vec<Value> = summaries
        .iter()
        .map(|s| serde_json::to_value(s).unwrap_or(Value::Null))
        .collect();

    let resp = ApiResponse::success(data, request_id, elapsed)
        .with_link("self", &format!("/api/v1/workflows/{workflow_id}/paused"));
    Ok(Json(resp))
}
