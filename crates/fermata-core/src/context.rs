//! Execution context: the mutable state of one in-progress graph execution.
//!
//! `ExecutionContext` is owned by exactly one in-flight request or resume
//! attempt at a time; it crosses process boundaries only through the codec
//! (`crate::codec`), never through shared memory. The in-memory shape uses
//! native maps and sets; the durable shape lives entirely inside the codec.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use fermata_types::execution::{
    BlockLog, BlockState, ContextMetadata, Decisions, LoopExecution, ParallelBlockMapping,
    ParallelExecution, StreamingConfig, WaitBlockInfo,
};
use fermata_types::graph::WorkflowGraph;

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Mutable state of one workflow run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub workspace_id: Uuid,

    /// Per-block outcome, one entry per block that has run.
    pub block_states: HashMap<String, BlockState>,
    /// Block ids that have completed. Monotonically grows.
    pub executed_blocks: HashSet<String>,
    /// The frontier: block ids eligible to run next.
    pub active_execution_path: HashSet<String>,
    /// Branch decisions at fan-out blocks.
    pub decisions: Decisions,

    /// Subflow iteration bookkeeping.
    pub loop_iterations: HashMap<String, u32>,
    pub loop_items: HashMap<String, Value>,
    pub completed_loops: HashSet<String>,
    pub loop_executions: HashMap<String, LoopExecution>,
    pub parallel_executions: HashMap<String, ParallelExecution>,
    pub parallel_block_mapping: HashMap<String, ParallelBlockMapping>,

    /// Append-only per-block execution log, in execution order.
    pub block_logs: Vec<BlockLog>,
    /// Transient pause control data.
    pub metadata: ContextMetadata,

    /// Execution-scoped configuration needed to resume without re-fetching
    /// the workflow definition.
    pub environment_variables: HashMap<String, Value>,
    pub workflow_variables: HashMap<String, Value>,
    pub workflow: Option<WorkflowGraph>,
    pub streaming: Option<StreamingConfig>,

    /// Set by a trigger-style wait block handler; the executor driver halts
    /// traversal when it sees this after a block returns.
    pub should_pause_after_block: bool,
}

impl ExecutionContext {
    /// Create a fresh context for a run.
    pub fn new(execution_id: Uuid, workflow_id: Uuid, workspace_id: Uuid) -> Self {
        Self {
            execution_id,
            workflow_id,
            workspace_id,
            ..Default::default()
        }
    }

    /// Whether a block has already completed in this run.
    pub fn is_executed(&self, block_id: &str) -> bool {
        self.executed_blocks.contains(block_id)
    }

    /// Record a block as executed with the given output.
    ///
    /// Keeps the executed-set/block-state invariant: the id joins
    /// `executed_blocks` and gains a state entry with `executed = true`.
    pub fn mark_executed(&mut self, block_id: &str, output: Value, execution_time_ms: u64) {
        self.block_states.insert(
            block_id.to_string(),
            BlockState::completed(output, execution_time_ms),
        );
        self.executed_blocks.insert(block_id.to_string());
        self.active_execution_path.remove(block_id);
    }

    /// Append a block log entry.
    pub fn push_log(&mut self, log: BlockLog) {
        self.block_logs.push(log);
    }

    /// Record the branch taken at a router block.
    pub fn set_router_decision(&mut self, block_id: &str, target: &str) {
        self.decisions
            .router
            .insert(block_id.to_string(), target.to_string());
    }

    /// Record the branch taken at a condition block.
    pub fn set_condition_decision(&mut self, block_id: &str, handle: &str) {
        self.decisions
            .condition
            .insert(block_id.to_string(), handle.to_string());
    }

    /// Mark the context as pausing after the current block: set the flag the
    /// executor driver checks, and record where and why.
    pub fn request_pause(&mut self, info: WaitBlockInfo) {
        self.should_pause_after_block = true;
        self.metadata.is_paused = true;
        self.metadata.wait_block_info = Some(info);
    }

    /// Clear a pending pause request. Must run before re-entering traversal
    /// from a paused context, or the executor immediately re-pauses on the
    /// same block.
    pub fn clear_pause_request(&mut self) {
        self.should_pause_after_block = false;
        self.metadata.is_paused = false;
        self.metadata.wait_block_info = None;
    }

    /// Rebuild `executed_blocks` (and the invariant-linked state entries)
    /// from the block logs. Logs are the source of truth for "what ran"
    /// when the set itself might be stale after deserialization.
    pub fn reconstruct_executed_from_logs(&mut self) {
        for log in &self.block_logs {
            if !log.success {
                continue;
            }
            self.executed_blocks.insert(log.block_id.clone());
            self.block_states
                .entry(log.block_id.clone())
                .or_insert_with(|| {
                    BlockState::completed(
                        log.output.clone().unwrap_or(Value::Null),
                        log.duration_ms,
                    )
                });
        }
    }

    /// Synthesize the wait block's log entry for a resume: started when the
    /// run paused, ended now.
    pub fn push_resume_log(
        &mut self,
        block_id: &str,
        block_name: &str,
        paused_at: chrono::DateTime<Utc>,
        output: Value,
        success: bool,
        error: Option<String>,
    ) {
        let now = Utc::now();
        self.block_logs.push(BlockLog {
            id: Some(Uuid::now_v7()),
            block_id: block_id.to_string(),
            block_name: block_name.to_string(),
            block_type: "wait".to_string(),
            started_at: paused_at,
            ended_at: now,
            duration_ms: (now - paused_at).num_milliseconds().max(0) as u64,
            success,
            input: None,
            output: Some(output),
            error,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
