//! Run persistence trait definition.
//!
//! Sink for execution outcomes and block logs. Idempotent on repeated calls
//! for the same execution: a paused run is recorded as pending and later
//! overwritten by its terminal state, never duplicated.

use uuid::Uuid;

use fermata_types::error::RepositoryError;
use fermata_types::execution::BlockLog;

/// Terminal or intermediate status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

/// Repository trait for run outcome persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait RunSink: Send + Sync {
    /// Record (or overwrite) the run's status and logs. The same execution
    /// id always maps to one row.
    fn record_run(
        &self,
        execution_id: &Uuid,
        workflow_id: &Uuid,
        status: RunStatus,
        logs: &[BlockLog],
        error: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
