//! Execution bookkeeping records: per-block state, block logs, and subflow
//! iteration state.
//!
//! These are the values the execution context accumulates while a run is in
//! flight and that must survive the pause/resume serialization boundary.
//! Iteration records carry nested maps keyed by iteration index; the context
//! codec is responsible for their durable representation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::ResumeTriggerKind;

// ---------------------------------------------------------------------------
// Block state
// ---------------------------------------------------------------------------

/// Recorded outcome of one block that has run.
///
/// Invariant: a block id appears in the context's executed-block set iff it
/// has a `BlockState` entry with `executed == true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockState {
    /// Arbitrary JSON output of the block.
    pub output: Value,
    /// Whether the block completed.
    pub executed: bool,
    /// Wall-clock execution time in milliseconds.
    #[serde(default)]
    pub execution_time_ms: u64,
}

impl BlockState {
    /// A completed block state with the given output.
    pub fn completed(output: Value, execution_time_ms: u64) -> Self {
        Self {
            output,
            executed: true,
            execution_time_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Block log
// ---------------------------------------------------------------------------

/// One entry of the append-only per-block execution log.
///
/// Ordering is execution order. Logs double as the source of truth for
/// "what ran" when the executed-block set itself might be stale; the resume
/// coordinator reconstructs the set from logs on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockLog {
    /// Explicit log id when one was assigned; merge key fallback is
    /// `block_id + started_at + success`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<uuid::Uuid>,
    pub block_id: String,
    pub block_name: String,
    pub block_type: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BlockLog {
    /// Stable merge key: explicit id when present, else block id + start
    /// timestamp + outcome.
    pub fn merge_key(&self) -> String {
        match self.id {
            Some(id) => id.to_string(),
            None => format!(
                "{}:{}:{}",
                self.block_id,
                self.started_at.timestamp_millis(),
                self.success
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Decision history
// ---------------------------------------------------------------------------

/// Which branch was taken at each fan-out block, needed to recompute
/// reachability on resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decisions {
    /// Router block id -> chosen target block id.
    #[serde(default)]
    pub router: BTreeMap<String, String>,
    /// Condition block id -> taken branch handle.
    #[serde(default)]
    pub condition: BTreeMap<String, String>,
}

impl Decisions {
    pub fn is_empty(&self) -> bool {
        self.router.is_empty() && self.condition.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Subflow iteration state
// ---------------------------------------------------------------------------

/// Iteration state of one parallel subflow execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParallelExecution {
    /// Number of parallel branches.
    pub branch_count: u32,
    /// Collection distributed across branches, when in collection mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_items: Option<Value>,
    /// Branches that have completed.
    pub completed_branches: u32,
    /// Per-iteration results keyed by iteration key (`<block>_parallel_<n>`).
    /// BTreeMap keeps iteration order stable across serialization.
    #[serde(default)]
    pub branch_results: BTreeMap<String, Value>,
    /// Iteration indices currently in flight.
    #[serde(default)]
    pub active_branches: BTreeSet<u32>,
}

/// Iteration state of one loop subflow execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopExecution {
    /// Upper bound on iterations.
    pub max_iterations: u32,
    /// Current (0-based) iteration index.
    pub current_iteration: u32,
    /// Collection being iterated, for forEach loops.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_each_items: Option<Value>,
    /// Per-iteration results keyed by iteration key.
    #[serde(default)]
    pub iteration_results: BTreeMap<String, Value>,
}

/// Maps a virtual per-iteration block id back to its source block and
/// iteration index inside a parallel subflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelBlockMapping {
    pub parallel_id: String,
    pub original_block_id: String,
    pub iteration_index: u32,
}

// ---------------------------------------------------------------------------
// Context metadata and streaming config
// ---------------------------------------------------------------------------

/// Transient control data attached to a context: pause flags, not business
/// data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_block_info: Option<WaitBlockInfo>,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Where and why a run paused, recorded on the context at pause time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitBlockInfo {
    pub block_id: String,
    pub block_name: String,
    pub trigger: ResumeTriggerKind,
    pub paused_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
}

/// Execution-scoped streaming configuration, carried so a resume behaves
/// like the original request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamingConfig {
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub selected_outputs: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
