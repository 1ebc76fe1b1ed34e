//! Wait registry trait definition.
//!
//! Cross-process rendezvous between an execution that blocks synchronously
//! for an external signal and the request that delivers it. Signals are
//! durable within the wait window, so delivery before registration still
//! wakes the waiter.

use serde_json::Value;
use uuid::Uuid;

use fermata_types::error::WaitRegistryError;
use fermata_types::graph::WaitInfo;

/// How long a synchronous wait holds its task before giving up.
pub const WAIT_TIMEOUT_SECS: u64 = 180;

/// Registry trait for synchronous wait rendezvous.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WaitRegistry: Send + Sync {
    /// Register the wait and block until a signal arrives or the wait
    /// window elapses. `None` means timeout; the registration is removed
    /// either way.
    fn wait_for_resume(
        &self,
        info: &WaitInfo,
    ) -> impl std::future::Future<Output = Result<Option<Value>, WaitRegistryError>> + Send;

    /// Deliver a resume signal. Returns `true` when the signal was stored
    /// or handed to a waiter, `false` when a signal for this execution was
    /// already consumed. A second delivery after consumption is a no-op.
    fn resume_execution(
        &self,
        execution_id: &Uuid,
        resume_data: Value,
        block_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<bool, WaitRegistryError>> + Send;

    /// Look up a live registration, optionally narrowed to a block id.
    fn get_wait_info(
        &self,
        execution_id: &Uuid,
        block_id: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Option<WaitInfo>, WaitRegistryError>> + Send;

    /// Remove a registration and wake its waiter with a cancellation.
    /// Returns `true` if a registration existed.
    fn cancel_wait(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, WaitRegistryError>> + Send;
}
