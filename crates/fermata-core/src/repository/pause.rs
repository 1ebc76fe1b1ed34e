//! Pause store trait definition.
//!
//! Durable storage for paused executions. The infrastructure layer
//! implements this with SQLite; coordinator tests use an in-memory fake.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use fermata_types::error::RepositoryError;
use fermata_types::execution::BlockLog;
use fermata_types::graph::WorkflowGraph;
use fermata_types::pause::{
    ConsumeOutcome, PauseMetadata, PauseReceipt, PausedExecution, PausedSummary,
};

/// Everything the executor hands over when a wait block suspends a run.
#[derive(Debug, Clone)]
pub struct PauseParams {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub workspace_id: Uuid,
    /// Durable context JSON from the codec.
    pub context: Value,
    pub workflow_graph: WorkflowGraph,
    pub environment: HashMap<String, Value>,
    pub workflow_input: Option<Value>,
    pub metadata: PauseMetadata,
}

/// Repository trait for pause persistence.
///
/// At most one live pause exists per execution id. `pause` is an
/// insert-or-no-op: a duplicate call returns the already-stored receipt so
/// concurrent pause attempts race benignly.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait PauseStore: Send + Sync {
    /// Persist a pause snapshot. On conflict with an existing row for the
    /// same execution, returns the existing row's receipt unchanged.
    fn pause(
        &self,
        params: PauseParams,
    ) -> impl std::future::Future<Output = Result<PauseReceipt, RepositoryError>> + Send;

    /// Load a pause by execution id.
    fn load(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<PausedExecution>, RepositoryError>> + Send;

    /// Load a pause by its one-time approval token.
    fn load_by_token(
        &self,
        token: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<PausedExecution>, RepositoryError>> + Send;

    /// Atomically consume the approval token, flipping `approval_used`
    /// from false to true. The outcome distinguishes a successful first
    /// consumption from a replay and from an unknown token.
    fn consume_approval(
        &self,
        token: &Uuid,
    ) -> impl std::future::Future<Output = Result<ConsumeOutcome, RepositoryError>> + Send;

    /// Delete a pause row. Returns `true` if it existed.
    fn delete(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Re-pause in place: replace the stored context and metadata of an
    /// existing row, touching `updated_at`.
    fn update(
        &self,
        execution_id: &Uuid,
        context: Value,
        metadata: PauseMetadata,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Merge new log entries into the stored metadata without rewriting the
    /// context snapshot.
    fn append_logs(
        &self,
        execution_id: &Uuid,
        logs: &[BlockLog],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List live pauses for a workflow, optionally narrowed to one wait
    /// block id.
    fn list_for_workflow(
        &self,
        workflow_id: &Uuid,
        block_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<PausedSummary>, RepositoryError>> + Send;

    /// List schedule-trigger pauses whose wake time is at or before `now`.
    fn list_due_schedules(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<PausedSummary>, RepositoryError>> + Send;
}
