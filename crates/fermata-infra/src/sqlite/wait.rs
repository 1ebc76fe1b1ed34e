//! SQLite wait registry: cross-process rendezvous through mailbox tables.
//!
//! A blocked task writes a row into `wait_registrations` and polls
//! `wait_signals` at 100 ms until a signal arrives, the registration is
//! cancelled, or the wait window elapses. Signals are durable within the
//! window, so a resume delivered before the waiter registers still wakes it.
//! Because both tables live in the shared database, waiter and resumer can
//! be different processes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use fermata_core::repository::wait::{WAIT_TIMEOUT_SECS, WaitRegistry};
use fermata_types::error::WaitRegistryError;
use fermata_types::graph::WaitInfo;
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

const POLL_INTERVAL_MS: u64 = 100;

/// SQLite-backed implementation of `WaitRegistry`.
pub struct SqliteWaitRegistry {
    pool: DatabasePool,
    timeout: Duration,
}

impl SqliteWaitRegistry {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            timeout: Duration::from_secs(WAIT_TIMEOUT_SECS),
        }
    }

    /// Override the wait window. Exposed for tests.
    pub fn with_timeout(pool: DatabasePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Drop signals and registrations whose window has passed.
    async fn purge_expired(&self) -> Result<(), WaitRegistryError> {
        let now = format_datetime(&Utc::now());
        sqlx::query("DELETE FROM wait_signals WHERE expires_at < ?")
            .bind(&now)
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        sqlx::query("DELETE FROM wait_registrations WHERE expires_at < ?")
            .bind(&now)
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    /// Atomically claim an unconsumed signal. Returns its payload.
    async fn claim_signal(
        &self,
        execution_id: &Uuid,
    ) -> Result<Option<Value>, WaitRegistryError> {
        let result = sqlx::query(
            "UPDATE wait_signals SET consumed = 1 WHERE execution_id = ? AND consumed = 0",
        )
        .bind(execution_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let (payload,): (String,) =
            sqlx::query_as("SELECT payload FROM wait_signals WHERE execution_id = ?")
                .bind(execution_id.to_string())
                .fetch_one(&self.pool.reader)
                .await
                .map_err(query_err)?;
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|e| WaitRegistryError::Query(format!("invalid signal payload: {e}")))
    }

    async fn remove_registration(&self, execution_id: &Uuid) -> Result<bool, WaitRegistryError> {
        let result = sqlx::query("DELETE FROM wait_registrations WHERE execution_id = ?")
            .bind(execution_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn registration_exists(&self, execution_id: &Uuid) -> Result<bool, WaitRegistryError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM wait_registrations WHERE execution_id = ?")
                .bind(execution_id.to_string())
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(query_err)?;
        Ok(row.is_some())
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, WaitRegistryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| WaitRegistryError::Query(format!("invalid datetime: {e}")))
}

fn query_err(e: sqlx::Error) -> WaitRegistryError {
    WaitRegistryError::Query(e.to_string())
}

impl WaitRegistry for SqliteWaitRegistry {
    async fn wait_for_resume(&self, info: &WaitInfo) -> Result<Option<Value>, WaitRegistryError> {
        self.purge_expired().await?;

        let now = Utc::now();
        let expires = now + chrono::Duration::from_std(self.timeout).unwrap_or_default();
        sqlx::query(
            r#"INSERT INTO wait_registrations
               (execution_id, workflow_id, block_id, trigger, resume_url, paused_at, expires_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(execution_id) DO UPDATE SET
                 block_id = excluded.block_id,
                 expires_at = excluded.expires_at"#,
        )
        .bind(info.execution_id.to_string())
        .bind(info.workflow_id.to_string())
        .bind(&info.block_id)
        .bind(trigger_str(info))
        .bind(&info.resume_url)
        .bind(format_datetime(&info.paused_at))
        .bind(format_datetime(&expires))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        tracing::debug!(
            execution_id = %info.execution_id,
            block_id = %info.block_id,
            timeout_secs = self.timeout.as_secs(),
            "registered synchronous wait"
        );

        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            if let Some(payload) = self.claim_signal(&info.execution_id).await? {
                self.remove_registration(&info.execution_id).await?;
                return Ok(Some(payload));
            }
            // Cancellation removes the registration out from under us.
            if !self.registration_exists(&info.execution_id).await? {
                return Ok(None);
            }
            if tokio::time::Instant::now() >= deadline {
                self.remove_registration(&info.execution_id).await?;
                tracing::debug!(execution_id = %info.execution_id, "synchronous wait timed out");
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    async fn resume_execution(
        &self,
        execution_id: &Uuid,
        resume_data: Value,
        block_id: Option<&str>,
    ) -> Result<bool, WaitRegistryError> {
        self.purge_expired().await?;

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT consumed FROM wait_signals WHERE execution_id = ?")
                .bind(execution_id.to_string())
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(query_err)?;

        if let Some((consumed,)) = existing {
            // A second delivery after consumption is a no-op.
            if consumed != 0 {
                return Ok(false);
            }
            return Ok(true);
        }

        let now = Utc::now();
        let expires = now + chrono::Duration::from_std(self.timeout).unwrap_or_default();
        let payload = serde_json::to_string(&resume_data)
            .map_err(|e| WaitRegistryError::Query(format!("serialize signal payload: {e}")))?;
        sqlx::query(
            r#"INSERT INTO wait_signals
               (execution_id, block_id, payload, consumed, created_at, expires_at)
               VALUES (?, ?, ?, 0, ?, ?)"#,
        )
        .bind(execution_id.to_string())
        .bind(block_id)
        .bind(payload)
        .bind(format_datetime(&now))
        .bind(format_datetime(&expires))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        tracing::debug!(%execution_id, "resume signal stored");
        Ok(true)
    }

    async fn get_wait_info(
        &self,
        execution_id: &Uuid,
        block_id: Option<&str>,
    ) -> Result<Option<WaitInfo>, WaitRegistryError> {
        let row = sqlx::query(
            "SELECT * FROM wait_registrations WHERE execution_id = ? AND expires_at >= ?",
        )
        .bind(execution_id.to_string())
        .bind(format_datetime(&Utc::now()))
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let registered_block: String = row.try_get("block_id").map_err(query_err)?;
        if block_id.is_some_and(|b| b != registered_block) {
            return Ok(None);
        }

        let workflow_id: String = row.try_get("workflow_id").map_err(query_err)?;
        let trigger: String = row.try_get("trigger").map_err(query_err)?;
        let resume_url: String = row.try_get("resume_url").map_err(query_err)?;
        let paused_at: String = row.try_get("paused_at").map_err(query_err)?;

        Ok(Some(WaitInfo {
            workflow_id: workflow_id
                .parse()
                .map_err(|e| WaitRegistryError::Query(format!("invalid UUID: {e}")))?,
            execution_id: *execution_id,
            block_id: registered_block,
            paused_at: parse_datetime(&paused_at)?,
            resume_url,
            trigger: serde_json::from_value(Value::String(trigger.clone()))
                .map_err(|_| WaitRegistryError::Query(format!("invalid trigger: {trigger}")))?,
        }))
    }

    async fn cancel_wait(&self, execution_id: &Uuid) -> Result<bool, WaitRegistryError> {
        let removed = self.remove_registration(execution_id).await?;
        if removed {
            tracing::info!(%execution_id, "synchronous wait cancelled");
        }
        Ok(removed)
    }
}

fn trigger_str(info: &WaitInfo) -> String {
    serde_json::to_value(info.trigger)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "manual".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
