//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Approval links (token is the credential, no API key)
        .route(
            "/executions/{execution_id}/approve/{token}",
            post(handlers::execution::approve_execution),
        )
        // Pause inspection and wait cancellation
        .route(
            "/executions/{execution_id}/paused",
            get(handlers::execution::get_paused_execution),
        )
        .route(
            "/executions/{execution_id}/cancel",
            post(handlers::execution::cancel_execution),
        )
        // Signed API resume and pause listing
        .route(
            "/workflows/{workflow_id}/executions/{execution_id}/resume",
            post(handlers::workflow::resume_execution),
        )
        .route(
            "/workflows/{workflow_id}/paused",
            get(handlers::workflow::list_paused),
        )
        // External webhook resume
        .route(
            "/webhooks/resume/{workflow_id}/{execution_id}",
            post(handlers::webhook::webhook_resume),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
