//! In-process wait registry backed by DashMap and Notify.
//!
//! Same contract as the SQLite registry: signals delivered before the waiter
//! registers are held until claimed, a claimed signal rejects redelivery,
//! and a timed-out wait removes its registration. Only valid within one
//! process.

use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use fermata_core::repository::wait::{WAIT_TIMEOUT_SECS, WaitRegistry};
use fermata_types::error::WaitRegistryError;
use fermata_types::graph::WaitInfo;
use serde_json::Value;
use tokio::sync::Notify;
use uuid::Uuid;

/// DashMap/Notify mailbox implementing `WaitRegistry` for a single process.
pub struct InMemoryWaitRegistry {
    registrations: DashMap<Uuid, WaitInfo>,
    signals: DashMap<Uuid, Value>,
    consumed: DashSet<Uuid>,
    cancelled: DashSet<Uuid>,
    notifiers: DashMap<Uuid, Arc<Notify>>,
    timeout: Duration,
}

impl InMemoryWaitRegistry {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(WAIT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            registrations: DashMap::new(),
            signals: DashMap::new(),
            consumed: DashSet::new(),
            cancelled: DashSet::new(),
            notifiers: DashMap::new(),
            timeout,
        }
    }

    fn notifier(&self, execution_id: &Uuid) -> Arc<Notify> {
        self.notifiers
            .entry(*execution_id)
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    fn cleanup(&self, execution_id: &Uuid) {
        self.registrations.remove(execution_id);
        self.notifiers.remove(execution_id);
        self.cancelled.remove(execution_id);
    }
}

impl Default for InMemoryWaitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitRegistry for InMemoryWaitRegistry {
    async fn wait_for_resume(&self, info: &WaitInfo) -> Result<Option<Value>, WaitRegistryError> {
        let execution_id = info.execution_id;
        self.registrations.insert(execution_id, info.clone());
        let notify = self.notifier(&execution_id);

        tracing::debug!(
            %execution_id,
            block_id = %info.block_id,
            timeout_secs = self.timeout.as_secs(),
            "registered in-memory wait"
        );

        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            if let Some((_, payload)) = self.signals.remove(&execution_id) {
                self.consumed.insert(execution_id);
                self.cleanup(&execution_id);
                return Ok(Some(payload));
            }
            if self.cancelled.contains(&execution_id) {
                self.cleanup(&execution_id);
                return Ok(None);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                self.cleanup(&execution_id);
                tracing::debug!(%execution_id, "in-memory wait timed out");
                return Ok(None);
            }
            // Wake on notify or re-check at the deadline.
            let _ = tokio::time::timeout(deadline - now, notify.notified()).await;
        }
    }

    async fn resume_execution(
        &self,
        execution_id: &Uuid,
        resume_data: Value,
        _block_id: Option<&str>,
    ) -> Result<bool, WaitRegistryError> {
        if self.consumed.contains(execution_id) {
            return Ok(false);
        }
        self.signals.insert(*execution_id, resume_data);
        self.notifier(execution_id).notify_one();
        tracing::debug!(%execution_id, "resume signal stored in memory");
        Ok(true)
    }

    async fn get_wait_info(
        &self,
        execution_id: &Uuid,
        block_id: Option<&str>,
    ) -> Result<Option<WaitInfo>, WaitRegistryError> {
        Ok(self
            .registrations
            .get(execution_id)
            .filter(|entry| block_id.is_none_or(|b| entry.block_id == b))
            .map(|entry| entry.value().clone()))
    }

    async fn cancel_wait(&self, execution_id: &Uuid) -> Result<bool, WaitRegistryError> {
        if !self.registrations.contains_key(execution_id) {
            return Ok(false);
        }
        self.cancelled.insert(*execution_id);
        self.notifier(execution_id).notify_one();
        tracing::info!(%execution_id, "in-memory wait cancelled");
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fermata_types::graph::ResumeTriggerKind;
    use serde_json::json;

    fn info(execution_id: Uuid) -> WaitInfo {
        WaitInfo {
            workflow_id: Uuid::now_v7(),
            execution_id,
            block_id: "gate".into(),
            paused_at: chrono::Utc::now(),
            resume_url: "http://localhost:3100/resume".into(),
            trigger: ResumeTriggerKind::Webhook,
        }
    }

    #[tokio::test]
    async fn timeout_returns_none() {
        let registry = InMemoryWaitRegistry::with_timeout(Duration::from_millis(200));
        let eid = Uuid::now_v7();

        let result = registry.wait_for_resume(&info(eid)).await.unwrap();
        assert!(result.is_none());
        assert!(registry.get_wait_info(&eid, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn early_signal_wakes_immediately() {
        let registry = InMemoryWaitRegistry::with_timeout(Duration::from_secs(2));
        let eid = Uuid::now_v7();

        assert!(
            registry
                .resume_execution(&eid, json!({ "n": 1 }), None)
                .await
                .unwrap()
        );
        let result = registry.wait_for_resume(&info(eid)).await.unwrap();
        assert_eq!(result, Some(json!({ "n": 1 })));

        assert!(
            !registry
                .resume_execution(&eid, json!({ "n": 2 }), None)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn notify_wakes_concurrent_waiter() {
        let registry = Arc::new(InMemoryWaitRegistry::with_timeout(Duration::from_secs(5)));
        let eid = Uuid::now_v7();

        let waiter = {
            let registry = Arc::clone(&registry);
            let info = info(eid);
            tokio::spawn(async move { registry.wait_for_resume(&info).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(
            registry
                .resume_execution(&eid, json!({ "ok": true }), None)
                .await
                .unwrap()
        );

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result, Some(json!({ "ok": true })));
    }

    #[tokio::test]
    async fn cancel_wakes_with_none() {
        let registry = Arc::new(InMemoryWaitRegistry::with_timeout(Duration::from_secs(5)));
        let eid = Uuid::now_v7();

        let waiter = {
            let registry = Arc::clone(&registry);
            let info = info(eid);
            tokio::spawn(async move { registry.wait_for_resume(&info).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(registry.cancel_wait(&eid).await.unwrap());

        let result = waiter.await.unwrap().unwrap();
        assert!(result.is_none());
    }
}
