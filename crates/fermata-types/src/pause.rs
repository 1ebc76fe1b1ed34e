//! The persisted pause entity and its metadata.
//!
//! A `PausedExecution` is the durable snapshot taken when a wait/approval
//! block suspends a run. At most one non-deleted row exists per execution id;
//! the store enforces insert-or-no-op on conflict so racing pause calls
//! converge on a single token.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::execution::BlockLog;
use crate::graph::{ApiInputField, ApprovalMode, ResponseTemplate, ResumeTriggerKind, WorkflowGraph};

// ---------------------------------------------------------------------------
// PausedExecution
// ---------------------------------------------------------------------------

/// The durable snapshot of a paused in-flight execution.
///
/// Lifecycle: created at pause time; consumed and deleted at successful
/// resume, or updated in place when a resume hits a further wait block.
/// Every mutation touches `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PausedExecution {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub workspace_id: Uuid,
    /// Serialized execution context in its durable codec shape.
    pub context: Value,
    /// Frozen graph snapshot the resume traverses.
    pub workflow_graph: WorkflowGraph,
    /// Environment variable snapshot at pause time.
    #[serde(default)]
    pub environment: HashMap<String, Value>,
    /// Original workflow input, replayed on resume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_input: Option<Value>,
    pub metadata: PauseMetadata,
    /// One-time-use token embedded in the human approval URL.
    pub approval_token: Uuid,
    /// Set when the approval token has been consumed.
    pub approval_used: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resume metadata stored with a pause record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseMetadata {
    /// The wait block the run is paused at.
    pub block_id: String,
    pub block_name: String,
    /// Which trigger may wake this pause.
    pub trigger: ResumeTriggerKind,
    #[serde(default)]
    pub mode: ApprovalMode,
    /// Declared API resume payload schema.
    #[serde(default)]
    pub api_input_format: Vec<ApiInputField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_template: Option<ResponseTemplate>,
    /// Shared secret a webhook resume must present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    /// Set when this execution was invoked as a child workflow of another
    /// paused execution; completion cascades to the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution: Option<ParentExecutionInfo>,
    /// Whether the run originated from a deployed workflow version. Webhook
    /// resumes are only trusted for deployed-context pauses.
    #[serde(default)]
    pub is_deployed_context: bool,
    pub paused_at: DateTime<Utc>,
    /// When a schedule-trigger pause becomes due.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_wake_at: Option<DateTime<Utc>>,
    /// Block logs accumulated so far, kept here so a polling UI sees
    /// progress without deserializing the whole context.
    #[serde(default)]
    pub block_logs: Vec<BlockLog>,
}

/// Link from a child execution back to the paused parent that spawned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentExecutionInfo {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub workspace_id: Uuid,
    /// The child-workflow block inside the parent's graph.
    pub block_id: String,
}

// ---------------------------------------------------------------------------
// Store results
// ---------------------------------------------------------------------------

/// What `pause` hands back to the caller: the one-time token and the URL a
/// human approver follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseReceipt {
    pub approval_token: Uuid,
    pub approve_url: String,
}

/// Listing row for "is there a live pause for this block" queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PausedSummary {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub block_id: String,
    pub trigger: ResumeTriggerKind,
    pub paused_at: DateTime<Utc>,
}

/// Outcome of atomically consuming an approval token.
///
/// `AlreadyUsed` is distinct from `NotFound` so callers can answer
/// "link already used" rather than "invalid link".
#[derive(Debug)]
pub enum ConsumeOutcome {
    Consumed(Box<PausedExecution>),
    AlreadyUsed,
    NotFound,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
