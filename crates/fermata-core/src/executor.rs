//! Graph executor: drives block traversal and owns the pause touchpoints.
//!
//! Ordinary block semantics live behind the [`BlockHandler`] trait; this
//! module owns traversal order, the wait-block state machine, cooperative
//! cancellation, and re-entry from a frozen context.
//!
//! Wait block states: `Running -> (time) Sleeping -> {Resumed | Cancelled}`;
//! `Running -> Waiting -> Paused(persisted) -> {Resumed | Rejected}`. Only
//! `Paused` survives a process restart.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Value, json};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fermata_types::execution::{BlockLog, WaitBlockInfo};
use fermata_types::graph::{Block, BlockKind, WaitConfig, WorkflowGraph};

use crate::codec::{self, CodecError};
use crate::context::ExecutionContext;

/// Interval at which long sleeps poll the cancellation token.
const CANCEL_POLL_MS: u64 = 100;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("block '{block_id}' failed: {message}")]
    Block { block_id: String, message: String },

    #[error("context has no frozen workflow graph")]
    MissingGraph,

    #[error("edge references unknown block '{0}'")]
    UnknownBlock(String),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ---------------------------------------------------------------------------
// Block handler seam
// ---------------------------------------------------------------------------

/// What a handler produced for one block.
#[derive(Debug, Clone)]
pub struct HandlerOutput {
    pub output: Value,
    /// For router/condition blocks, the source handle of the chosen branch.
    pub decision: Option<String>,
}

impl HandlerOutput {
    pub fn value(output: Value) -> Self {
        Self {
            output,
            decision: None,
        }
    }

    pub fn branch(output: Value, handle: impl Into<String>) -> Self {
        Self {
            output,
            decision: Some(handle.into()),
        }
    }
}

/// Per-block dispatch for everything that is not a wait block.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait BlockHandler: Send + Sync {
    fn execute(
        &self,
        block: &Block,
        ctx: &ExecutionContext,
    ) -> impl std::future::Future<Output = Result<HandlerOutput, EngineError>> + Send;
}

impl<H: BlockHandler> BlockHandler for std::sync::Arc<H> {
    fn execute(
        &self,
        block: &Block,
        ctx: &ExecutionContext,
    ) -> impl std::future::Future<Output = Result<HandlerOutput, EngineError>> + Send {
        (**self).execute(block, ctx)
    }
}

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ResultMetadata {
    pub duration_ms: u64,
    pub executed_block_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_block_info: Option<WaitBlockInfo>,
}

/// Outcome of one traversal drive, whether it ran to completion, paused,
/// failed, or was cancelled.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub is_paused: bool,
    pub is_cancelled: bool,
    pub logs: Vec<BlockLog>,
    pub metadata: ResultMetadata,
}

// ---------------------------------------------------------------------------
// GraphExecutor
// ---------------------------------------------------------------------------

/// Drives one workflow graph. Stateless across runs; all run state lives in
/// the `ExecutionContext` it is handed.
pub struct GraphExecutor<H> {
    graph: WorkflowGraph,
    handler: H,
}

impl<H: BlockHandler> GraphExecutor<H> {
    pub fn new(graph: WorkflowGraph, handler: H) -> Self {
        Self { graph, handler }
    }

    /// Rebuild an executor and a live context from a frozen pause snapshot.
    ///
    /// The returned context never re-runs blocks already in
    /// `executed_blocks`, and its pause flag is cleared so traversal does
    /// not immediately re-pause on the wait block it stopped at.
    pub fn from_paused_state(
        graph: WorkflowGraph,
        durable_context: Value,
        environment: HashMap<String, Value>,
        workflow_input: HashMap<String, Value>,
        handler: H,
    ) -> Result<(Self, ExecutionContext), EngineError> {
        let mut ctx = codec::decode(durable_context)?;
        ctx.clear_pause_request();
        for (k, v) in environment {
            ctx.environment_variables.entry(k).or_insert(v);
        }
        for (k, v) in workflow_input {
            ctx.workflow_variables.entry(k).or_insert(v);
        }
        ctx.workflow = Some(graph.clone());
        Ok((Self::new(graph, handler), ctx))
    }

    /// Start a fresh run: seed the frontier with the graph's root blocks
    /// (no incoming edges) and drive to completion or pause.
    pub async fn execute(
        &self,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        if ctx.active_execution_path.is_empty() {
            for block in &self.graph.blocks {
                if !self.graph.edges.iter().any(|e| e.target == block.id) {
                    ctx.active_execution_path.insert(block.id.clone());
                }
            }
        }
        self.drive(ctx, cancel).await
    }

    /// Continue a previously paused run from its current frontier.
    pub async fn resume_from_context(
        &self,
        workflow_id: Uuid,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        debug!(
            %workflow_id,
            execution_id = %ctx.execution_id,
            frontier = ctx.active_execution_path.len(),
            "resuming traversal from frozen context"
        );
        // A stale flag from the snapshot would stop traversal before the
        // first block runs.
        ctx.clear_pause_request();
        self.drive(ctx, cancel).await
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    async fn drive(
        &self,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let started = Instant::now();
        let mut last_output = Value::Null;

        loop {
            if cancel.is_cancelled() {
                info!(execution_id = %ctx.execution_id, "traversal cancelled");
                return self.finish(ctx, started, last_output, None, false, true);
            }

            let ready = self.ready_blocks(ctx);
            let Some(block_id) = ready.into_iter().next() else {
                return self.finish(ctx, started, last_output, None, false, false);
            };
            let Some(block) = self.graph.block(&block_id) else {
                let err = EngineError::UnknownBlock(block_id);
                return self.finish(ctx, started, last_output, Some(err.to_string()), false, false);
            };

            let block_started = Utc::now();
            let outcome = match &block.kind {
                BlockKind::Wait(config) => {
                    match self.run_wait_block(block, config, ctx, cancel).await {
                        WaitStep::Slept(output) => Ok(HandlerOutput::value(output)),
                        WaitStep::Cancelled => {
                            return self.finish(ctx, started, last_output, None, false, true);
                        }
                        WaitStep::Pausing => {
                            // Pause flag and wait_block_info are already on
                            // the context; the caller persists the snapshot.
                            return self.finish(ctx, started, last_output, None, true, false);
                        }
                    }
                }
                _ => self.handler.execute(block, ctx).await,
            };

            match outcome {
                Ok(out) => {
                    let elapsed = (Utc::now() - block_started).num_milliseconds().max(0) as u64;
                    if let Some(handle) = &out.decision {
                        match block.kind {
                            BlockKind::Router => ctx.set_router_decision(&block.id, handle),
                            BlockKind::Condition => ctx.set_condition_decision(&block.id, handle),
                            _ => {}
                        }
                    }
                    last_output = out.output.clone();
                    ctx.push_log(BlockLog {
                        id: Some(Uuid::now_v7()),
                        block_id: block.id.clone(),
                        block_name: block.name.clone(),
                        block_type: block.kind.type_name().to_string(),
                        started_at: block_started,
                        ended_at: Utc::now(),
                        duration_ms: elapsed,
                        success: true,
                        input: None,
                        output: Some(out.output.clone()),
                        error: None,
                    });
                    ctx.mark_executed(&block.id, out.output, elapsed);
                    self.advance_frontier(ctx, &block.id, out.decision.as_deref());
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!(
                        execution_id = %ctx.execution_id,
                        block_id = %block.id,
                        error = %message,
                        "block failed"
                    );
                    ctx.push_log(BlockLog {
                        id: Some(Uuid::now_v7()),
                        block_id: block.id.clone(),
                        block_name: block.name.clone(),
                        block_type: block.kind.type_name().to_string(),
                        started_at: block_started,
                        ended_at: Utc::now(),
                        duration_ms: (Utc::now() - block_started).num_milliseconds().max(0) as u64,
                        success: false,
                        input: None,
                        output: None,
                        error: Some(message.clone()),
                    });
                    return self.finish(ctx, started, last_output, Some(message), false, false);
                }
            }

            if ctx.should_pause_after_block {
                return self.finish(ctx, started, last_output, None, true, false);
            }
        }
    }

    /// Blocks eligible to run now: on the frontier, not yet executed, and
    /// every in-edge from a reachable source already satisfied. Sorted for
    /// deterministic order.
    fn ready_blocks(&self, ctx: &ExecutionContext) -> Vec<String> {
        let mut ready: Vec<String> = ctx
            .active_execution_path
            .iter()
            .filter(|id| !ctx.is_executed(id))
            .filter(|id| {
                self.graph.edges.iter().all(|e| {
                    if e.target != **id {
                        return true;
                    }
                    let source_reachable = ctx.is_executed(&e.source)
                        || ctx.active_execution_path.contains(&e.source);
                    !source_reachable || ctx.is_executed(&e.source)
                })
            })
            .cloned()
            .collect();
        ready.sort();
        ready
    }

    /// Add the just-finished block's downstream targets to the frontier.
    /// A recorded branch decision restricts fan-out to the chosen handle.
    fn advance_frontier(&self, ctx: &mut ExecutionContext, block_id: &str, decision: Option<&str>) {
        for edge in &self.graph.edges {
            if edge.source != block_id {
                continue;
            }
            if let Some(chosen) = decision {
                if edge.source_handle.as_deref() != Some(chosen) {
                    continue;
                }
            }
            if !ctx.is_executed(&edge.target) {
                ctx.active_execution_path.insert(edge.target.clone());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Wait blocks
    // -----------------------------------------------------------------------

    async fn run_wait_block(
        &self,
        block: &Block,
        config: &WaitConfig,
        ctx: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> WaitStep {
        match config {
            WaitConfig::Time { duration_ms } => {
                debug!(
                    execution_id = %ctx.execution_id,
                    block_id = %block.id,
                    duration_ms,
                    "time wait sleeping"
                );
                if sleep_with_cancel(*duration_ms, cancel).await {
                    WaitStep::Slept(json!({ "waited_ms": duration_ms }))
                } else {
                    WaitStep::Cancelled
                }
            }
            WaitConfig::Trigger(trigger) => {
                info!(
                    execution_id = %ctx.execution_id,
                    block_id = %block.id,
                    trigger = ?trigger.trigger,
                    "wait block suspending execution"
                );
                ctx.request_pause(WaitBlockInfo {
                    block_id: block.id.clone(),
                    block_name: block.name.clone(),
                    trigger: trigger.trigger,
                    paused_at: Utc::now(),
                    resume_url: None,
                });
                WaitStep::Pausing
            }
        }
    }

    fn finish(
        &self,
        ctx: &mut ExecutionContext,
        started: Instant,
        output: Value,
        error: Option<String>,
        is_paused: bool,
        is_cancelled: bool,
    ) -> ExecutionResult {
        let duration_ms = started.elapsed().as_millis() as u64;
        ctx.metadata.duration_ms = Some(duration_ms);
        ExecutionResult {
            success: error.is_none() && !is_cancelled,
            output,
            error,
            is_paused,
            is_cancelled,
            logs: ctx.block_logs.clone(),
            metadata: ResultMetadata {
                duration_ms,
                executed_block_count: ctx.executed_blocks.len(),
                wait_block_info: ctx.metadata.wait_block_info.clone(),
            },
        }
    }
}

enum WaitStep {
    Slept(Value),
    Pausing,
    Cancelled,
}

/// Sleep for `duration_ms`, polling the cancellation token every 100 ms.
/// Returns `false` if cancelled before the deadline.
async fn sleep_with_cancel(duration_ms: u64, cancel: &CancellationToken) -> bool {
    let deadline = Instant::now() + Duration::from_millis(duration_ms);
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        let step = (deadline - now).min(Duration::from_millis(CANCEL_POLL_MS));
        tokio::time::sleep(step).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
