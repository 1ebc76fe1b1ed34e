//! SQLite pause store implementation.
//!
//! Implements `PauseStore` from `fermata-core` using sqlx with split
//! read/write pools. The context snapshot, frozen graph, and pause metadata
//! are stored as JSON blobs; the approval token is a separate indexed column
//! so consumption is a single atomic UPDATE.

use chrono::{DateTime, Utc};
use fermata_core::repository::pause::{PauseParams, PauseStore};
use fermata_core::resume::logs::merge_logs;
use fermata_types::error::RepositoryError;
use fermata_types::execution::BlockLog;
use fermata_types::pause::{
    ConsumeOutcome, PauseMetadata, PauseReceipt, PausedExecution, PausedSummary,
};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `PauseStore`.
pub struct SqlitePauseStore {
    pool: DatabasePool,
    base_url: String,
}

impl SqlitePauseStore {
    pub fn new(pool: DatabasePool, base_url: String) -> Self {
        Self { pool, base_url }
    }

    fn approve_url(&self, execution_id: &Uuid, token: &Uuid) -> String {
        format!(
            "{}/api/v1/executions/{execution_id}/approve/{token}",
            self.base_url
        )
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct PausedRow {
    execution_id: String,
    workflow_id: String,
    workspace_id: String,
    context: String,
    workflow_graph: String,
    environment: String,
    workflow_input: Option<String>,
    metadata: String,
    approval_token: String,
    approval_used: i64,
    created_at: String,
    updated_at: String,
}

impl PausedRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            execution_id: row.try_get("execution_id")?,
            workflow_id: row.try_get("workflow_id")?,
            workspace_id: row.try_get("workspace_id")?,
            context: row.try_get("context")?,
            workflow_graph: row.try_get("workflow_graph")?,
            environment: row.try_get("environment")?,
            workflow_input: row.try_get("workflow_input")?,
            metadata: row.try_get("metadata")?,
            approval_token: row.try_get("approval_token")?,
            approval_used: row.try_get("approval_used")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_paused(self) -> Result<PausedExecution, RepositoryError> {
        Ok(PausedExecution {
            execution_id: parse_uuid(&self.execution_id)?,
            workflow_id: parse_uuid(&self.workflow_id)?,
            workspace_id: parse_uuid(&self.workspace_id)?,
            context: parse_json(&self.context, "context")?,
            workflow_graph: serde_json::from_str(&self.workflow_graph)
                .map_err(|e| RepositoryError::Query(format!("invalid workflow_graph JSON: {e}")))?,
            environment: serde_json::from_str(&self.environment)
                .map_err(|e| RepositoryError::Query(format!("invalid environment JSON: {e}")))?,
            workflow_input: self
                .workflow_input
                .as_deref()
                .map(|s| parse_json(s, "workflow_input"))
                .transpose()?,
            metadata: serde_json::from_str(&self.metadata)
                .map_err(|e| RepositoryError::Query(format!("invalid metadata JSON: {e}")))?,
            approval_token: parse_uuid(&self.approval_token)?,
            approval_used: self.approval_used != 0,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }

    fn into_summary(self) -> Result<PausedSummary, RepositoryError> {
        let metadata: PauseMetadata = serde_json::from_str(&self.metadata)
            .map_err(|e| RepositoryError::Query(format!("invalid metadata JSON: {e}")))?;
        Ok(PausedSummary {
            execution_id: parse_uuid(&self.execution_id)?,
            workflow_id: parse_uuid(&self.workflow_id)?,
            block_id: metadata.block_id,
            trigger: metadata.trigger,
            paused_at: metadata.paused_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_json(s: &str, field: &str) -> Result<serde_json::Value, RepositoryError> {
    serde_json::from_str(s)
        .map_err(|e| RepositoryError::Query(format!("invalid {field} JSON: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T, field: &str) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|e| RepositoryError::Query(format!("serialize {field}: {e}")))
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// PauseStore impl
// ---------------------------------------------------------------------------

impl PauseStore for SqlitePauseStore {
    async fn pause(&self, params: PauseParams) -> Result<PauseReceipt, RepositoryError> {
        let token = Uuid::now_v7();
        let now = format_datetime(&Utc::now());

        let result = sqlx::query(
            r#"INSERT INTO paused_executions
               (execution_id, workflow_id, workspace_id, context, workflow_graph,
                environment, workflow_input, metadata, approval_token, approval_used,
                created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
               ON CONFLICT(execution_id) DO NOTHING"#,
        )
        .bind(params.execution_id.to_string())
        .bind(params.workflow_id.to_string())
        .bind(params.workspace_id.to_string())
        .bind(to_json(&params.context, "context")?)
        .bind(to_json(&params.workflow_graph, "workflow_graph")?)
        .bind(to_json(&params.environment, "environment")?)
        .bind(
            params
                .workflow_input
                .as_ref()
                .map(|v| to_json(v, "workflow_input"))
                .transpose()?,
        )
        .bind(to_json(&params.metadata, "metadata")?)
        .bind(token.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            // A concurrent pause won the race; hand back its receipt.
            let existing: (String,) =
                sqlx::query_as("SELECT approval_token FROM paused_executions WHERE execution_id = ?")
                    .bind(params.execution_id.to_string())
                    .fetch_one(&self.pool.reader)
                    .await
                    .map_err(query_err)?;
            let existing_token = parse_uuid(&existing.0)?;
            tracing::debug!(
                execution_id = %params.execution_id,
                "pause already exists, returning existing receipt"
            );
            return Ok(PauseReceipt {
                approve_url: self.approve_url(&params.execution_id, &existing_token),
                approval_token: existing_token,
            });
        }

        tracing::info!(
            execution_id = %params.execution_id,
            block_id = %params.metadata.block_id,
            trigger = ?params.metadata.trigger,
            "execution paused"
        );
        Ok(PauseReceipt {
            approve_url: self.approve_url(&params.execution_id, &token),
            approval_token: token,
        })
    }

    async fn load(&self, execution_id: &Uuid) -> Result<Option<PausedExecution>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM paused_executions WHERE execution_id = ?")
            .bind(execution_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.map(|r| PausedRow::from_row(&r).map_err(query_err)?.into_paused())
            .transpose()
    }

    async fn load_by_token(&self, token: &Uuid) -> Result<Option<PausedExecution>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM paused_executions WHERE approval_token = ?")
            .bind(token.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.map(|r| PausedRow::from_row(&r).map_err(query_err)?.into_paused())
            .transpose()
    }

    async fn consume_approval(&self, token: &Uuid) -> Result<ConsumeOutcome, RepositoryError> {
        let result = sqlx::query(
            "UPDATE paused_executions SET approval_used = 1, updated_at = ? \
             WHERE approval_token = ? AND approval_used = 0",
        )
        .bind(format_datetime(&Utc::now()))
        .bind(token.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 1 {
            let paused = self
                .load_by_token(token)
                .await?
                .ok_or(RepositoryError::NotFound)?;
            return Ok(ConsumeOutcome::Consumed(Box::new(paused)));
        }

        // Zero rows updated: either the token was already used or it does
        // not exist.
        let used: Option<(i64,)> =
            sqlx::query_as("SELECT approval_used FROM paused_executions WHERE approval_token = ?")
                .bind(token.to_string())
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(query_err)?;

        Ok(match used {
            Some(_) => ConsumeOutcome::AlreadyUsed,
            None => ConsumeOutcome::NotFound,
        })
    }

    async fn delete(&self, execution_id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM paused_executions WHERE execution_id = ?")
            .bind(execution_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn update(
        &self,
        execution_id: &Uuid,
        context: serde_json::Value,
        metadata: PauseMetadata,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE paused_executions SET context = ?, metadata = ?, updated_at = ? \
             WHERE execution_id = ?",
        )
        .bind(to_json(&context, "context")?)
        .bind(to_json(&metadata, "metadata")?)
        .bind(format_datetime(&Utc::now()))
        .bind(execution_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn append_logs(
        &self,
        execution_id: &Uuid,
        logs: &[BlockLog],
    ) -> Result<(), RepositoryError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT metadata FROM paused_executions WHERE execution_id = ?")
                .bind(execution_id.to_string())
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(query_err)?;

        let Some((metadata_json,)) = row else {
            return Err(RepositoryError::NotFound);
        };
        let mut metadata: PauseMetadata = serde_json::from_str(&metadata_json)
            .map_err(|e| RepositoryError::Query(format!("invalid metadata JSON: {e}")))?;
        metadata.block_logs = merge_logs(&metadata.block_logs, logs);

        sqlx::query(
            "UPDATE paused_executions SET metadata = ?, updated_at = ? WHERE execution_id = ?",
        )
        .bind(to_json(&metadata, "metadata")?)
        .bind(format_datetime(&Utc::now()))
        .bind(execution_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn list_for_workflow(
        &self,
        workflow_id: &Uuid,
        block_id: Option<&str>,
    ) -> Result<Vec<PausedSummary>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM paused_executions WHERE workflow_id = ?")
            .bind(workflow_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let summary = PausedRow::from_row(row).map_err(query_err)?.into_summary()?;
            if block_id.is_none_or(|b| summary.block_id == b) {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    async fn list_due_schedules(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<PausedSummary>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM paused_executions")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        let mut due = Vec::new();
        for row in &rows {
            let metadata_json: String = row.try_get("metadata").map_err(query_err)?;
            let metadata: PauseMetadata = serde_json::from_str(&metadata_json)
                .map_err(|e| RepositoryError::Query(format!("invalid metadata JSON: {e}")))?;
            if metadata.schedule_wake_at.is_some_and(|t| t <= now) {
                due.push(PausedRow::from_row(row).map_err(query_err)?.into_summary()?);
            }
        }
        Ok(due)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
