//! Frozen workflow graph snapshot types.
//!
//! A `WorkflowGraph` is captured at pause time and persisted alongside the
//! serialized execution context, so a resume never has to re-fetch the
//! workflow definition (which may have been edited since). The graph is the
//! topology the resume coordinator recomputes reachability against.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Frozen snapshot of a workflow graph: blocks, edges, and subflow groupings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// All blocks in the workflow.
    pub blocks: Vec<Block>,
    /// Directed edges between blocks.
    pub edges: Vec<Edge>,
    /// Loop subflow configurations keyed by loop block id.
    #[serde(default)]
    pub loops: HashMap<String, LoopConfig>,
    /// Parallel subflow configurations keyed by parallel block id.
    #[serde(default)]
    pub parallels: HashMap<String, ParallelConfig>,
}

impl WorkflowGraph {
    /// Look up a block by id.
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Iterate the edges leaving a block.
    pub fn outgoing(&self, source: &str) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source == source)
    }
}

/// A single node in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Stable block id. Subflow iteration keys are derived from it
    /// (e.g. `<id>_parallel_2`), so ids are strings rather than UUIDs.
    pub id: String,
    /// Human-readable block name.
    pub name: String,
    /// The kind of block.
    pub kind: BlockKind,
    /// Block-type-specific configuration, opaque to the engine.
    #[serde(default)]
    pub config: serde_json::Value,
}

/// The kind of block, as far as the pause/resume engine cares.
///
/// Ordinary blocks (`Task`) are dispatched through the `BlockHandler`
/// collaborator; their per-type semantics are not the engine's business.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    /// A wait/approval block that can suspend the whole run.
    Wait(WaitConfig),
    /// A router block: exactly one outgoing branch is taken, recorded in
    /// the context's decision history.
    Router,
    /// A condition block: the taken branch is identified by the matching
    /// edge's `source_handle`.
    Condition,
    /// Invocation of another workflow as a child execution.
    ChildWorkflow { workflow_id: Uuid },
    /// Any other block type, identified by its catalog name.
    Task { block_type: String },
}

impl BlockKind {
    /// Stable type name for logs.
    pub fn type_name(&self) -> &str {
        match self {
            BlockKind::Wait(_) => "wait",
            BlockKind::Router => "router",
            BlockKind::Condition => "condition",
            BlockKind::ChildWorkflow { .. } => "workflow",
            BlockKind::Task { block_type } => block_type,
        }
    }
}

/// A directed edge between two blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    /// Which output handle of the source this edge leaves from. Condition
    /// blocks use this to distinguish branches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

// ---------------------------------------------------------------------------
// Subflow configuration
// ---------------------------------------------------------------------------

/// Loop subflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Block ids inside the loop body.
    pub nodes: Vec<String>,
    /// Maximum number of iterations.
    pub iterations: u32,
    /// `for`-style fixed count or `forEach` over a collection.
    pub loop_type: LoopType,
    /// Collection to iterate when `loop_type` is `ForEach`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_each_items: Option<serde_json::Value>,
}

/// How a loop subflow iterates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopType {
    For,
    ForEach,
}

/// Parallel subflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Block ids inside the parallel body.
    pub nodes: Vec<String>,
    /// Number of parallel branches (count mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Collection distributed across branches (collection mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Wait block configuration
// ---------------------------------------------------------------------------

/// Configuration of a wait/approval block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "wait", rename_all = "snake_case")]
pub enum WaitConfig {
    /// Sleep synchronously for a fixed duration. Occupies its task and
    /// polls cancellation every 100 ms; never persisted.
    Time { duration_ms: u64 },
    /// Suspend the run until an external trigger resumes it. The run is
    /// persisted as a `PausedExecution` and the original request returns.
    Trigger(TriggerWaitConfig),
}

/// A trigger-style wait: who is allowed to wake this block, and how the
/// wake-up payload is shaped and answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerWaitConfig {
    /// Which resume trigger wakes this block.
    pub trigger: ResumeTriggerKind,
    /// Approve/reject vs. free-form payload (manual trigger only).
    #[serde(default)]
    pub mode: ApprovalMode,
    /// Declared input schema for API-mode resumes. Required fields are
    /// validated before any context mutation.
    #[serde(default)]
    pub api_input_format: Vec<ApiInputField>,
    /// Optional response template substituted into the API resume response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_template: Option<ResponseTemplate>,
    /// Shared secret expected in the webhook resume request header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    /// Delay before a schedule-trigger pause becomes due, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_delay_ms: Option<u64>,
}

/// The external trigger kind that may resume a paused execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeTriggerKind {
    /// Human decision via the one-time approval link.
    Manual,
    /// Signed API call with a schema-validated payload.
    Api,
    /// Inbound webhook, gated on deployed-context executions.
    Webhook,
    /// Schedule tick once the wake time arrives.
    Schedule,
}

impl ResumeTriggerKind {
    /// Wire name of the trigger, matching its serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Api => "api",
            Self::Webhook => "webhook",
            Self::Schedule => "schedule",
        }
    }
}

/// Shape of a manual resume decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Approve/reject boolean, optionally with edited content.
    #[default]
    Approval,
    /// Arbitrary form fields supplied by the approver.
    CustomForm,
}

/// One declared field of an API-mode resume payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiInputField {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    /// Advisory type name ("string", "number", ...). Not enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
}

/// Configured response body for API-mode resumes.
///
/// String leaves may contain `<api.field>` placeholders resolved against the
/// resume payload and `<execution.*>` placeholders resolved against
/// contextual values (resume URL, execution id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTemplate {
    pub body: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

// ---------------------------------------------------------------------------
// Wait info (registry-only, ephemeral)
// ---------------------------------------------------------------------------

/// Registration record for a request task blocked in the wait registry.
///
/// Exists only while the task is blocked; removed on wake or timeout. The
/// registry bounds its lifetime with a TTL equal to the synchronous wait
/// window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitInfo {
    pub workflow_id: Uuid,
    pub execution_id: Uuid,
    pub block_id: String,
    pub paused_at: DateTime<Utc>,
    pub resume_url: String,
    pub trigger: ResumeTriggerKind,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
