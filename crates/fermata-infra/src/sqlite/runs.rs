//! SQLite run sink implementation.
//!
//! One row per execution, upserted as the run moves from pending (paused)
//! to a terminal state. Repeated calls for the same execution never create
//! duplicate completion rows.

use chrono::Utc;
use fermata_core::repository::runs::{RunSink, RunStatus};
use fermata_types::error::RepositoryError;
use fermata_types::execution::BlockLog;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `RunSink`.
pub struct SqliteRunSink {
    pool: DatabasePool,
}

impl SqliteRunSink {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl RunSink for SqliteRunSink {
    async fn record_run(
        &self,
        execution_id: &Uuid,
        workflow_id: &Uuid,
        status: RunStatus,
        logs: &[BlockLog],
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let logs_json = serde_json::to_string(logs)
            .map_err(|e| RepositoryError::Query(format!("serialize logs: {e}")))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO runs (execution_id, workflow_id, status, logs, error, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(execution_id) DO UPDATE SET
                 status = excluded.status,
                 logs = excluded.logs,
                 error = excluded.error,
                 updated_at = excluded.updated_at"#,
        )
        .bind(execution_id.to_string())
        .bind(workflow_id.to_string())
        .bind(status.as_str())
        .bind(logs_json)
        .bind(error)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    async fn sink() -> (SqliteRunSink, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteRunSink::new(pool), dir)
    }

    #[tokio::test]
    async fn pending_is_overwritten_by_terminal_state() {
        let (sink, _dir) = sink().await;
        let eid = Uuid::now_v7();
        let wid = Uuid::now_v7();

        sink.record_run(&eid, &wid, RunStatus::Pending, &[], None)
            .await
            .unwrap();
        sink.record_run(&eid, &wid, RunStatus::Completed, &[], None)
            .await
            .unwrap();

        let rows = sqlx::query("SELECT status FROM runs WHERE execution_id = ?")
            .bind(eid.to_string())
            .fetch_all(&sink.pool.reader)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let status: String = rows[0].try_get("status").unwrap();
        assert_eq!(status, "completed");
    }

    #[tokio::test]
    async fn failed_run_records_error() {
        let (sink, _dir) = sink().await;
        let eid = Uuid::now_v7();

        sink.record_run(&eid, &Uuid::now_v7(), RunStatus::Failed, &[], Some("boom"))
            .await
            .unwrap();

        let row = sqlx::query("SELECT status, error FROM runs WHERE execution_id = ?")
            .bind(eid.to_string())
            .fetch_one(&sink.pool.reader)
            .await
            .unwrap();
        let status: String = row.try_get("status").unwrap();
        let error: Option<String> = row.try_get("error").unwrap();
        assert_eq!(status, "failed");
        assert_eq!(error.as_deref(), Some("boom"));
    }
}
