//! Resume coordinator: wakes paused executions exactly once.
//!
//! Four triggers converge on one algorithm: load the pause snapshot, rebuild
//! the live context (logs are the source of truth for what ran), recompute
//! the frontier against the frozen graph, complete the wait block with a
//! trigger-shaped output, re-drive the executor, then persist the outcome.
//! Child completion cascades to paused parents through an in-process loop
//! rather than re-entrant endpoint calls.

pub mod logs;
pub mod template;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use fermata_types::error::{RepositoryError, WaitRegistryError};
use fermata_types::execution::{BlockLog, WaitBlockInfo};
use fermata_types::graph::{ApprovalMode, BlockKind, ResumeTriggerKind, WaitConfig, WaitInfo};
use fermata_types::pause::{ConsumeOutcome, ParentExecutionInfo, PauseMetadata, PausedExecution};

use crate::codec::{self, CodecError};
use crate::context::ExecutionContext;
use crate::executor::{BlockHandler, ExecutionResult, GraphExecutor};
use crate::reachability::rebuild_active_path;
use crate::repository::pause::{PauseParams, PauseStore};
use crate::repository::runs::{RunSink, RunStatus};
use crate::repository::wait::WaitRegistry;

use self::logs::{incremental_logs, merge_logs};
use self::template::TemplateContext;

const REJECTION_MESSAGE: &str = "Workflow rejected by user";
const WEBHOOK_TIMEOUT_MESSAGE: &str = "Timed out waiting for webhook delivery";

// ---------------------------------------------------------------------------
// Errors and request/response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// Payload failed validation against the declared input schema.
    /// Raised before any state mutation.
    #[error("{0}")]
    Validation(String),

    #[error("no paused execution found")]
    NotFound,

    /// The one-time approval token was already consumed.
    #[error("approval link already used")]
    AlreadyUsed,

    /// Webhook resume attempted against a non-deployed execution.
    #[error("webhook resume requires a deployed execution")]
    DeployedContextRequired,

    #[error(transparent)]
    Storage(#[from] RepositoryError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Registry(#[from] WaitRegistryError),
}

/// A human approve/reject decision, optionally carrying edited content or
/// custom form fields.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// Response template resolved for an API-mode resume.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResolvedTemplate {
    pub body: Value,
    pub status: u16,
}

/// What a resume trigger hands back to its caller: the execution result
/// with logs filtered to blocks that ran after this resume, plus the
/// resolved response template for API mode.
#[derive(Debug)]
pub struct ResumeOutcome {
    pub result: ExecutionResult,
    pub template: Option<ResolvedTemplate>,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Coordinates all resume triggers against the pause store, wait registry,
/// run sink, and block handler. Constructed once at process start.
pub struct ResumeCoordinator<P, W, R, H> {
    store: Arc<P>,
    registry: Arc<W>,
    runs: Arc<R>,
    handler: Arc<H>,
    base_url: String,
}

impl<P, W, R, H> ResumeCoordinator<P, W, R, H>
where
    P: PauseStore,
    W: WaitRegistry,
    R: RunSink,
    H: BlockHandler,
{
    pub fn new(
        store: Arc<P>,
        registry: Arc<W>,
        runs: Arc<R>,
        handler: Arc<H>,
        base_url: String,
    ) -> Self {
        Self {
            store,
            registry,
            runs,
            handler,
            base_url,
        }
    }

    // -----------------------------------------------------------------------
    // Entry points, one per trigger
    // -----------------------------------------------------------------------

    /// Human decision via the one-time approval link. Token consumption is
    /// atomic and happens before any graph resumption, so a replayed link
    /// is rejected without re-running anything.
    pub async fn resume_with_approval(
        &self,
        token: Uuid,
        decision: ApprovalDecision,
    ) -> Result<ResumeOutcome, ResumeError> {
        let paused = match self.store.consume_approval(&token).await? {
            ConsumeOutcome::Consumed(paused) => *paused,
            ConsumeOutcome::AlreadyUsed => return Err(ResumeError::AlreadyUsed),
            ConsumeOutcome::NotFound => return Err(ResumeError::NotFound),
        };
        info!(
            execution_id = %paused.execution_id,
            block_id = %paused.metadata.block_id,
            approved = decision.approved,
            "approval token consumed"
        );

        if !decision.approved {
            return self.reject(paused).await;
        }

        let wait_output = match paused.metadata.mode {
            ApprovalMode::Approval => json!({
                "approved": true,
                "content": decision.payload.unwrap_or(Value::Null),
            }),
            ApprovalMode::CustomForm => decision.payload.unwrap_or_else(|| json!({})),
        };
        let result = self.complete_wait_and_resume(paused, wait_output).await?;
        Ok(ResumeOutcome {
            result,
            template: None,
        })
    }

    /// Signed API resume. The payload is validated against the declared
    /// input schema before any context mutation.
    pub async fn resume_with_api(
        &self,
        workflow_id: Uuid,
        execution_id: Uuid,
        payload: Map<String, Value>,
    ) -> Result<ResumeOutcome, ResumeError> {
        let paused = self.load_for(workflow_id, execution_id).await?;
        self.require_trigger(&paused, ResumeTriggerKind::Api)?;

        for field in &paused.metadata.api_input_format {
            if field.required && !payload.contains_key(&field.name) {
                return Err(ResumeError::Validation(format!(
                    "Missing required field: {}",
                    field.name
                )));
            }
        }

        let resume_url = format!(
            "{}/api/v1/workflows/{workflow_id}/executions/{execution_id}/resume",
            self.base_url
        );
        let mut wait_output = payload.clone();
        wait_output.insert("resume_url".to_string(), json!(resume_url.clone()));

        let template_config = paused.metadata.response_template.clone();
        let result = self
            .complete_wait_and_resume(paused, Value::Object(wait_output))
            .await?;

        let template = template_config.map(|t| ResolvedTemplate {
            body: template::resolve(
                &t.body,
                &payload,
                &TemplateContext {
                    execution_id: execution_id.to_string(),
                    resume_url,
                },
            ),
            status: t.status.unwrap_or(200),
        });
        Ok(ResumeOutcome { result, template })
    }

    /// Inbound webhook resume. Fast path: if a task is synchronously blocked
    /// in the wait registry, hand the payload straight to it. Otherwise fall
    /// back to the full pause snapshot, permitted only for deployed-context
    /// executions.
    pub async fn resume_with_webhook(
        &self,
        workflow_id: Uuid,
        execution_id: Uuid,
        payload: Value,
    ) -> Result<ResumeOutcome, ResumeError> {
        if self
            .registry
            .get_wait_info(&execution_id, None)
            .await?
            .is_some()
            && self
                .registry
                .resume_execution(&execution_id, payload.clone(), None)
                .await?
        {
            info!(%execution_id, "webhook delivered to synchronous waiter");
            return Ok(ResumeOutcome {
                result: ExecutionResult {
                    success: true,
                    output: json!({ "delivered": true }),
                    ..Default::default()
                },
                template: None,
            });
        }

        let paused = self.load_for(workflow_id, execution_id).await?;
        self.require_trigger(&paused, ResumeTriggerKind::Webhook)?;
        if !paused.metadata.is_deployed_context {
            return Err(ResumeError::DeployedContextRequired);
        }

        let wait_output = json!({ "webhook": payload });
        let result = self.complete_wait_and_resume(paused, wait_output).await?;
        Ok(ResumeOutcome {
            result,
            template: None,
        })
    }

    /// Schedule tick: wake a schedule-trigger pause whose delay elapsed.
    pub async fn resume_on_schedule(
        &self,
        execution_id: Uuid,
    ) -> Result<ResumeOutcome, ResumeError> {
        let paused = self
            .store
            .load(&execution_id)
            .await?
            .ok_or(ResumeError::NotFound)?;
        self.require_trigger(&paused, ResumeTriggerKind::Schedule)?;
        let wait_output = json!({ "resumed_at": Utc::now().to_rfc3339() });
        let result = self.complete_wait_and_resume(paused, wait_output).await?;
        Ok(ResumeOutcome {
            result,
            template: None,
        })
    }

    // -----------------------------------------------------------------------
    // Common algorithm
    // -----------------------------------------------------------------------

    async fn load_for(
        &self,
        workflow_id: Uuid,
        execution_id: Uuid,
    ) -> Result<PausedExecution, ResumeError> {
        let paused = self
            .store
            .load(&execution_id)
            .await?
            .ok_or(ResumeError::NotFound)?;
        if paused.workflow_id != workflow_id {
            return Err(ResumeError::NotFound);
        }
        Ok(paused)
    }

    /// Each entry point only wakes pauses configured for its own trigger.
    /// A manual-approval gate cannot be bypassed through the API route, and
    /// a scheduled delay cannot be cut short by a stray webhook.
    fn require_trigger(
        &self,
        paused: &PausedExecution,
        expected: ResumeTriggerKind,
    ) -> Result<(), ResumeError> {
        if paused.metadata.trigger != expected {
            return Err(ResumeError::Validation(format!(
                "Execution is paused on a {} trigger and cannot be resumed this way",
                paused.metadata.trigger.as_str(),
            )));
        }
        Ok(())
    }

    /// Rebuild a live context from the snapshot: decode, merge stored logs,
    /// reconstruct the executed set from logs, recompute the frontier.
    fn rebuild_context(&self, paused: &PausedExecution) -> Result<ExecutionContext, ResumeError> {
        let mut ctx = codec::decode(paused.context.clone())?;
        ctx.block_logs = merge_logs(&paused.metadata.block_logs, &ctx.block_logs);
        ctx.reconstruct_executed_from_logs();
        rebuild_active_path(&mut ctx, &paused.workflow_graph, &paused.metadata.block_id);
        for (k, v) in &paused.environment {
            ctx.environment_variables
                .entry(k.clone())
                .or_insert_with(|| v.clone());
        }
        ctx.workflow = Some(paused.workflow_graph.clone());
        Ok(ctx)
    }

    /// Terminal rejection: failed wait log, delete the pause row, no
    /// executor re-invocation. The only terminal-without-resume path.
    async fn reject(&self, paused: PausedExecution) -> Result<ResumeOutcome, ResumeError> {
        let mut ctx = self.rebuild_context(&paused)?;
        let pre_resume = ctx.executed_blocks.clone();
        ctx.push_resume_log(
            &paused.metadata.block_id,
            &paused.metadata.block_name,
            paused.metadata.paused_at,
            json!({ "approved": false }),
            false,
            Some(REJECTION_MESSAGE.to_string()),
        );

        let merged = ctx.block_logs.clone();
        self.store.delete(&paused.execution_id).await?;
        self.record_run(
            &paused.execution_id,
            &paused.workflow_id,
            RunStatus::Failed,
            &merged,
            Some(REJECTION_MESSAGE),
        )
        .await;
        info!(execution_id = %paused.execution_id, "execution rejected");

        Ok(ResumeOutcome {
            result: ExecutionResult {
                success: false,
                output: Value::Null,
                error: Some(REJECTION_MESSAGE.to_string()),
                is_paused: false,
                is_cancelled: false,
                logs: incremental_logs(&merged, &pre_resume),
                metadata: crate::executor::ResultMetadata {
                    duration_ms: 0,
                    executed_block_count: ctx.executed_blocks.len(),
                    wait_block_info: None,
                },
            },
            template: None,
        })
    }

    /// Complete the wait block with its synthesized output, then re-drive
    /// the executor from the recomputed frontier.
    async fn complete_wait_and_resume(
        &self,
        paused: PausedExecution,
        wait_output: Value,
    ) -> Result<ExecutionResult, ResumeError> {
        let mut ctx = self.rebuild_context(&paused)?;
        // Snapshot before the wait block itself completes so its log counts
        // as part of this resume, not the prior run.
        let pre_resume = ctx.executed_blocks.clone();

        let elapsed = (Utc::now() - paused.metadata.paused_at)
            .num_milliseconds()
            .max(0) as u64;
        ctx.push_resume_log(
            &paused.metadata.block_id,
            &paused.metadata.block_name,
            paused.metadata.paused_at,
            wait_output.clone(),
            true,
            None,
        );
        ctx.mark_executed(&paused.metadata.block_id, wait_output, elapsed);

        self.drive(paused, ctx, pre_resume).await
    }

    /// Re-invoke the executor and persist whichever way it lands: paused
    /// again, completed, failed, or cancelled. Cascades to a paused parent
    /// on successful completion.
    async fn drive(
        &self,
        paused: PausedExecution,
        mut ctx: ExecutionContext,
        pre_resume: HashSet<String>,
    ) -> Result<ExecutionResult, ResumeError> {
        let executor = GraphExecutor::new(paused.workflow_graph.clone(), Arc::clone(&self.handler));
        let cancel = CancellationToken::new();
        let mut result = loop {
            let mut result = executor
                .resume_from_context(paused.workflow_id, &mut ctx, &cancel)
                .await;
            // A webhook wait outside a deployed context holds this task in
            // the wait registry instead of persisting a row the webhook
            // endpoint would refuse to resume.
            if result.is_paused
                && !paused.metadata.is_deployed_context
                && let Some(info) = ctx.metadata.wait_block_info.clone()
                && info.trigger == ResumeTriggerKind::Webhook
            {
                if self.hold_for_webhook(&paused, &mut ctx, &info).await? {
                    continue;
                }
                result.is_paused = false;
                result.success = false;
                result.error = Some(WEBHOOK_TIMEOUT_MESSAGE.to_string());
                result.metadata.wait_block_info = None;
            }
            break result;
        };
        let merged = ctx.block_logs.clone();

        if result.is_paused {
            self.persist_repause(&paused, &ctx, merged.clone()).await?;
            self.record_run(
                &paused.execution_id,
                &paused.workflow_id,
                RunStatus::Pending,
                &merged,
                None,
            )
            .await;
        } else {
            let status = if result.is_cancelled {
                RunStatus::Cancelled
            } else if result.success {
                RunStatus::Completed
            } else {
                RunStatus::Failed
            };
            self.record_run(
                &paused.execution_id,
                &paused.workflow_id,
                status,
                &merged,
                result.error.as_deref(),
            )
            .await;
            if let Err(err) = self.store.delete(&paused.execution_id).await {
                warn!(execution_id = %paused.execution_id, error = %err, "failed to delete pause row");
            }
            if result.success {
                self.cascade_parents(
                    paused.metadata.parent_execution.clone(),
                    result.output.clone(),
                )
                .await;
            }
        }

        result.logs = incremental_logs(&merged, &pre_resume);
        Ok(result)
    }

    /// Register the wait and block until the webhook endpoint delivers a
    /// payload or the wait window elapses. On delivery the wait block is
    /// completed in place and the frontier recomputed. Returns `false` on
    /// timeout; the registration is gone either way.
    async fn hold_for_webhook(
        &self,
        paused: &PausedExecution,
        ctx: &mut ExecutionContext,
        info: &WaitBlockInfo,
    ) -> Result<bool, ResumeError> {
        let wait_info = WaitInfo {
            workflow_id: paused.workflow_id,
            execution_id: paused.execution_id,
            block_id: info.block_id.clone(),
            paused_at: info.paused_at,
            resume_url: format!(
                "{}/api/v1/webhooks/resume/{}/{}",
                self.base_url, paused.workflow_id, paused.execution_id
            ),
            trigger: ResumeTriggerKind::Webhook,
        };
        info!(
            execution_id = %paused.execution_id,
            block_id = %info.block_id,
            "holding for synchronous webhook delivery"
        );
        let Some(payload) = self.registry.wait_for_resume(&wait_info).await? else {
            ctx.push_resume_log(
                &info.block_id,
                &info.block_name,
                info.paused_at,
                Value::Null,
                false,
                Some(WEBHOOK_TIMEOUT_MESSAGE.to_string()),
            );
            return Ok(false);
        };

        let wait_output = json!({ "webhook": payload });
        let elapsed = (Utc::now() - info.paused_at).num_milliseconds().max(0) as u64;
        ctx.clear_pause_request();
        ctx.push_resume_log(
            &info.block_id,
            &info.block_name,
            info.paused_at,
            wait_output.clone(),
            true,
            None,
        );
        ctx.mark_executed(&info.block_id, wait_output, elapsed);
        rebuild_active_path(ctx, &paused.workflow_graph, &info.block_id);
        Ok(true)
    }

    /// Persist a new pause for the wait block the resumed traversal stopped
    /// at. Same block means an in-place update; a different block replaces
    /// the row (and mints a fresh approval token).
    async fn persist_repause(
        &self,
        paused: &PausedExecution,
        ctx: &ExecutionContext,
        merged_logs: Vec<BlockLog>,
    ) -> Result<(), ResumeError> {
        let info = ctx
            .metadata
            .wait_block_info
            .clone()
            .ok_or_else(|| ResumeError::Validation("paused result without wait info".into()))?;

        let mut metadata = metadata_for_block(paused, &info.block_id, &info.block_name);
        metadata.block_logs = merged_logs;
        let context = codec::encode(ctx)?;

        if info.block_id == paused.metadata.block_id {
            self.store
                .update(&paused.execution_id, context, metadata)
                .await?;
        } else {
            self.store.delete(&paused.execution_id).await?;
            self.store
                .pause(PauseParams {
                    execution_id: paused.execution_id,
                    workflow_id: paused.workflow_id,
                    workspace_id: paused.workspace_id,
                    context,
                    workflow_graph: paused.workflow_graph.clone(),
                    environment: paused.environment.clone(),
                    workflow_input: paused.workflow_input.clone(),
                    metadata,
                })
                .await?;
        }
        info!(
            execution_id = %paused.execution_id,
            block_id = %info.block_id,
            "execution paused again"
        );
        Ok(())
    }

    /// Walk the parent chain after a successful completion. Each level is
    /// deleted before the next resumes, so the loop terminates. Errors here
    /// never fail the child's own response.
    async fn cascade_parents(&self, mut parent: Option<ParentExecutionInfo>, mut output: Value) {
        while let Some(info) = parent {
            match self.resume_parent(&info, output).await {
                Ok(Some((next_parent, next_output))) => {
                    parent = next_parent;
                    output = next_output;
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(
                        parent_execution_id = %info.execution_id,
                        error = %err,
                        "parent cascade failed"
                    );
                    break;
                }
            }
        }
    }

    /// Complete the parent's child-workflow block with the child's output
    /// and resume the parent. Returns the grandparent link when the parent
    /// itself completed successfully.
    async fn resume_parent(
        &self,
        info: &ParentExecutionInfo,
        child_output: Value,
    ) -> Result<Option<(Option<ParentExecutionInfo>, Value)>, ResumeError> {
        let Some(paused) = self.store.load(&info.execution_id).await? else {
            return Ok(None);
        };
        info!(
            parent_execution_id = %info.execution_id,
            block_id = %info.block_id,
            "cascading child completion to paused parent"
        );

        let mut ctx = self.rebuild_context(&paused)?;
        let pre_resume = ctx.executed_blocks.clone();
        let elapsed = (Utc::now() - paused.metadata.paused_at)
            .num_milliseconds()
            .max(0) as u64;
        let block_name = paused
            .workflow_graph
            .block(&info.block_id)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| info.block_id.clone());
        ctx.push_resume_log(
            &info.block_id,
            &block_name,
            paused.metadata.paused_at,
            child_output.clone(),
            true,
            None,
        );
        ctx.mark_executed(&info.block_id, child_output, elapsed);

        // Persist before resuming so a crash mid-cascade leaves the parent
        // resumable with the child's output applied.
        let mut metadata = paused.metadata.clone();
        metadata.block_logs = ctx.block_logs.clone();
        self.store
            .update(&paused.execution_id, codec::encode(&ctx)?, metadata)
            .await?;

        let next_parent = paused.metadata.parent_execution.clone();
        // drive -> cascade_parents -> resume_parent -> drive is a cycle;
        // boxing here keeps the future sized.
        let result = Box::pin(self.drive(paused, ctx, pre_resume)).await?;

        if !result.is_paused && !result.is_cancelled && result.success {
            Ok(Some((next_parent, result.output)))
        } else {
            Ok(None)
        }
    }

    /// Run sink failures are recoverable: log completeness is best-effort
    /// relative to execution correctness.
    async fn record_run(
        &self,
        execution_id: &Uuid,
        workflow_id: &Uuid,
        status: RunStatus,
        logs: &[BlockLog],
        error: Option<&str>,
    ) {
        if let Err(err) = self
            .runs
            .record_run(execution_id, workflow_id, status, logs, error)
            .await
        {
            warn!(%execution_id, error = %err, "failed to persist run record");
        }
    }
}

/// Build pause metadata for the wait block a traversal stopped at, reading
/// the block's trigger configuration from the frozen graph. Deployment
/// context and the parent link carry over from the previous pause.
fn metadata_for_block(paused: &PausedExecution, block_id: &str, block_name: &str) -> PauseMetadata {
    let trigger_config = paused.workflow_graph.block(block_id).and_then(|b| {
        if let BlockKind::Wait(WaitConfig::Trigger(cfg)) = &b.kind {
            Some(cfg.clone())
        } else {
            None
        }
    });

    let now = Utc::now();
    match trigger_config {
        Some(cfg) => PauseMetadata {
            block_id: block_id.to_string(),
            block_name: block_name.to_string(),
            trigger: cfg.trigger,
            mode: cfg.mode,
            api_input_format: cfg.api_input_format,
            response_template: cfg.response_template,
            webhook_secret: cfg.webhook_secret,
            parent_execution: paused.metadata.parent_execution.clone(),
            is_deployed_context: paused.metadata.is_deployed_context,
            paused_at: now,
            schedule_wake_at: match cfg.trigger {
                ResumeTriggerKind::Schedule => cfg
                    .schedule_delay_ms
                    .map(|ms| now + chrono::Duration::milliseconds(ms as i64)),
                _ => None,
            },
            block_logs: Vec::new(),
        },
        None => PauseMetadata {
            block_id: block_id.to_string(),
            block_name: block_name.to_string(),
            trigger: ResumeTriggerKind::Manual,
            mode: ApprovalMode::Approval,
            api_input_format: Vec::new(),
            response_template: None,
            webhook_secret: None,
            parent_execution: paused.metadata.parent_execution.clone(),
            is_deployed_context: paused.metadata.is_deployed_context,
            paused_at: now,
            schedule_wake_at: None,
            block_logs: Vec::new(),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::HandlerOutput;
    use fermata_types::error::RepositoryError;
    use fermata_types::execution::BlockLog;
    use fermata_types::graph::{
        ApiInputField, Block, Edge, TriggerWaitConfig, WaitInfo, WorkflowGraph,
    };
    use fermata_types::pause::{PauseReceipt, PausedSummary};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -- in-memory fakes ----------------------------------------------------

    #[derive(Default)]
    struct MemoryPauseStore {
        rows: Mutex<HashMap<Uuid, PausedExecution>>,
    }

    impl MemoryPauseStore {
        fn seed(&self, paused: PausedExecution) {
            self.rows
                .lock()
                .unwrap()
                .insert(paused.execution_id, paused);
        }

        fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }

        fn get(&self, execution_id: &Uuid) -> Option<PausedExecution> {
            self.rows.lock().unwrap().get(execution_id).cloned()
        }
    }

    impl PauseStore for MemoryPauseStore {
        async fn pause(&self, params: PauseParams) -> Result<PauseReceipt, RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows.get(&params.execution_id) {
                return Ok(PauseReceipt {
                    approval_token: existing.approval_token,
                    approve_url: String::new(),
                });
            }
            let token = Uuid::now_v7();
            let now = Utc::now();
            rows.insert(
                params.execution_id,
                PausedExecution {
                    execution_id: params.execution_id,
                    workflow_id: params.workflow_id,
                    workspace_id: params.workspace_id,
                    context: params.context,
                    workflow_graph: params.workflow_graph,
                    environment: params.environment,
                    workflow_input: params.workflow_input,
                    metadata: params.metadata,
                    approval_token: token,
                    approval_used: false,
                    created_at: now,
                    updated_at: now,
                },
            );
            Ok(PauseReceipt {
                approval_token: token,
                approve_url: String::new(),
            })
        }

        async fn load(
            &self,
            execution_id: &Uuid,
        ) -> Result<Option<PausedExecution>, RepositoryError> {
            Ok(self.rows.lock().unwrap().get(execution_id).cloned())
        }

        async fn load_by_token(
            &self,
            token: &Uuid,
        ) -> Result<Option<PausedExecution>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .find(|p| p.approval_token == *token)
                .cloned())
        }

        async fn consume_approval(&self, token: &Uuid) -> Result<ConsumeOutcome, RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            let Some(row) = rows.values_mut().find(|p| p.approval_token == *token) else {
                return Ok(ConsumeOutcome::NotFound);
            };
            if row.approval_used {
                return Ok(ConsumeOutcome::AlreadyUsed);
            }
            row.approval_used = true;
            Ok(ConsumeOutcome::Consumed(Box::new(row.clone())))
        }

        async fn delete(&self, execution_id: &Uuid) -> Result<bool, RepositoryError> {
            Ok(self.rows.lock().unwrap().remove(execution_id).is_some())
        }

        async fn update(
            &self,
            execution_id: &Uuid,
            context: Value,
            metadata: PauseMetadata,
        ) -> Result<(), RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(execution_id).ok_or(RepositoryError::NotFound)?;
            row.context = context;
            row.metadata = metadata;
            row.updated_at = Utc::now();
            Ok(())
        }

        async fn append_logs(
            &self,
            execution_id: &Uuid,
            logs: &[BlockLog],
        ) -> Result<(), RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(row) = rows.get_mut(execution_id) {
                row.metadata.block_logs = merge_logs(&row.metadata.block_logs, logs);
            }
            Ok(())
        }

        async fn list_for_workflow(
            &self,
            workflow_id: &Uuid,
            block_id: Option<&str>,
        ) -> Result<Vec<PausedSummary>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.workflow_id == *workflow_id)
                .filter(|p| block_id.is_none_or(|b| p.metadata.block_id == b))
                .map(|p| PausedSummary {
                    execution_id: p.execution_id,
                    workflow_id: p.workflow_id,
                    block_id: p.metadata.block_id.clone(),
                    trigger: p.metadata.trigger,
                    paused_at: p.metadata.paused_at,
                })
                .collect())
        }

        async fn list_due_schedules(
            &self,
            now: chrono::DateTime<Utc>,
        ) -> Result<Vec<PausedSummary>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.metadata.schedule_wake_at.is_some_and(|t| t <= now))
                .map(|p| PausedSummary {
                    execution_id: p.execution_id,
                    workflow_id: p.workflow_id,
                    block_id: p.metadata.block_id.clone(),
                    trigger: p.metadata.trigger,
                    paused_at: p.metadata.paused_at,
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct NullRegistry;

    impl WaitRegistry for NullRegistry {
        async fn wait_for_resume(
            &self,
            _info: &WaitInfo,
        ) -> Result<Option<Value>, WaitRegistryError> {
            Ok(None)
        }

        async fn resume_execution(
            &self,
            _execution_id: &Uuid,
            _resume_data: Value,
            _block_id: Option<&str>,
        ) -> Result<bool, WaitRegistryError> {
            Ok(false)
        }

        async fn get_wait_info(
            &self,
            _execution_id: &Uuid,
            _block_id: Option<&str>,
        ) -> Result<Option<WaitInfo>, WaitRegistryError> {
            Ok(None)
        }

        async fn cancel_wait(&self, _execution_id: &Uuid) -> Result<bool, WaitRegistryError> {
            Ok(false)
        }
    }

    /// Registry that actually parks its waiter, for the synchronous webhook
    /// handoff.
    #[derive(Default)]
    struct ParkingRegistry {
        waits: Mutex<HashMap<Uuid, WaitInfo>>,
        signals: Mutex<HashMap<Uuid, Value>>,
        notify: tokio::sync::Notify,
    }

    impl WaitRegistry for ParkingRegistry {
        async fn wait_for_resume(
            &self,
            info: &WaitInfo,
        ) -> Result<Option<Value>, WaitRegistryError> {
            self.waits
                .lock()
                .unwrap()
                .insert(info.execution_id, info.clone());
            loop {
                let notified = self.notify.notified();
                if let Some(v) = self.signals.lock().unwrap().remove(&info.execution_id) {
                    self.waits.lock().unwrap().remove(&info.execution_id);
                    return Ok(Some(v));
                }
                if tokio::time::timeout(std::time::Duration::from_secs(2), notified)
                    .await
                    .is_err()
                {
                    self.waits.lock().unwrap().remove(&info.execution_id);
                    return Ok(None);
                }
            }
        }

        async fn resume_execution(
            &self,
            execution_id: &Uuid,
            resume_data: Value,
            _block_id: Option<&str>,
        ) -> Result<bool, WaitRegistryError> {
            if !self.waits.lock().unwrap().contains_key(execution_id) {
                return Ok(false);
            }
            self.signals.lock().unwrap().insert(*execution_id, resume_data);
            self.notify.notify_one();
            Ok(true)
        }

        async fn get_wait_info(
            &self,
            execution_id: &Uuid,
            _block_id: Option<&str>,
        ) -> Result<Option<WaitInfo>, WaitRegistryError> {
            Ok(self.waits.lock().unwrap().get(execution_id).cloned())
        }

        async fn cancel_wait(&self, execution_id: &Uuid) -> Result<bool, WaitRegistryError> {
            let removed = self.waits.lock().unwrap().remove(execution_id).is_some();
            self.notify.notify_one();
            Ok(removed)
        }
    }

    #[derive(Default)]
    struct MemoryRunSink {
        records: Mutex<HashMap<Uuid, (RunStatus, usize)>>,
    }

    impl RunSink for MemoryRunSink {
        async fn record_run(
            &self,
            execution_id: &Uuid,
            _workflow_id: &Uuid,
            status: RunStatus,
            logs: &[BlockLog],
            _error: Option<&str>,
        ) -> Result<(), RepositoryError> {
            self.records
                .lock()
                .unwrap()
                .insert(*execution_id, (status, logs.len()));
            Ok(())
        }
    }

    struct CountingHandler {
        calls: AtomicUsize,
    }

    impl CountingHandler {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl BlockHandler for CountingHandler {
        async fn execute(
            &self,
            block: &Block,
            _ctx: &ExecutionContext,
        ) -> Result<HandlerOutput, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerOutput::value(json!({ "ran": block.id })))
        }
    }

    use crate::executor::EngineError;

    // -- fixtures -----------------------------------------------------------

    fn task(id: &str) -> Block {
        Block {
            id: id.into(),
            name: id.to_uppercase(),
            kind: BlockKind::Task {
                block_type: "noop".into(),
            },
            config: json!({}),
        }
    }

    fn gate(id: &str, trigger: ResumeTriggerKind, fields: Vec<ApiInputField>) -> Block {
        Block {
            id: id.into(),
            name: id.to_uppercase(),
            kind: BlockKind::Wait(WaitConfig::Trigger(TriggerWaitConfig {
                trigger,
                mode: ApprovalMode::Approval,
                api_input_format: fields,
                response_template: None,
                webhook_secret: None,
                schedule_delay_ms: None,
            })),
            config: json!({}),
        }
    }

    fn edge(source: &str, target: &str) -> Edge {
        Edge {
            source: source.into(),
            target: target.into(),
            source_handle: None,
        }
    }

    /// start -> gate -> after, paused at gate with start executed.
    fn paused_at_gate(trigger: ResumeTriggerKind, fields: Vec<ApiInputField>) -> PausedExecution {
        let graph = WorkflowGraph {
            blocks: vec![
                task("start"),
                gate("gate", trigger, fields.clone()),
                task("after"),
            ],
            edges: vec![edge("start", "gate"), edge("gate", "after")],
            loops: Default::default(),
            parallels: Default::default(),
        };

        let mut ctx = ExecutionContext::new(Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        ctx.mark_executed("start", json!({ "ok": true }), 2);
        let started = Utc::now() - chrono::Duration::seconds(5);
        ctx.push_log(BlockLog {
            id: Some(Uuid::now_v7()),
            block_id: "start".into(),
            block_name: "START".into(),
            block_type: "noop".into(),
            started_at: started,
            ended_at: started,
            duration_ms: 2,
            success: true,
            input: None,
            output: Some(json!({ "ok": true })),
            error: None,
        });

        let now = Utc::now();
        PausedExecution {
            execution_id: ctx.execution_id,
            workflow_id: ctx.workflow_id,
            workspace_id: ctx.workspace_id,
            context: codec::encode(&ctx).unwrap(),
            workflow_graph: graph,
            environment: HashMap::new(),
            workflow_input: None,
            metadata: PauseMetadata {
                block_id: "gate".into(),
                block_name: "GATE".into(),
                trigger,
                mode: ApprovalMode::Approval,
                api_input_format: fields,
                response_template: None,
                webhook_secret: None,
                parent_execution: None,
                is_deployed_context: true,
                paused_at: now - chrono::Duration::seconds(3),
                schedule_wake_at: None,
                block_logs: Vec::new(),
            },
            approval_token: Uuid::now_v7(),
            approval_used: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// start -> gate -> hook -> finish, paused at gate in a non-deployed
    /// context, where hook is a webhook-trigger wait.
    fn paused_before_webhook_gate(trigger: ResumeTriggerKind) -> PausedExecution {
        let mut paused = paused_at_gate(trigger, vec![]);
        paused.metadata.is_deployed_context = false;
        paused.workflow_graph = WorkflowGraph {
            blocks: vec![
                task("start"),
                gate("gate", trigger, vec![]),
                gate("hook", ResumeTriggerKind::Webhook, vec![]),
                task("finish"),
            ],
            edges: vec![
                edge("start", "gate"),
                edge("gate", "hook"),
                edge("hook", "finish"),
            ],
            loops: Default::default(),
            parallels: Default::default(),
        };
        paused
    }

    fn coordinator(
        store: Arc<MemoryPauseStore>,
        handler: Arc<CountingHandler>,
    ) -> ResumeCoordinator<MemoryPauseStore, NullRegistry, MemoryRunSink, CountingHandler> {
        ResumeCoordinator::new(
            store,
            Arc::new(NullRegistry),
            Arc::new(MemoryRunSink::default()),
            handler,
            "http://localhost:3100".into(),
        )
    }

    // -- scenarios ----------------------------------------------------------

    #[tokio::test]
    async fn approval_resumes_exactly_once() {
        let store = Arc::new(MemoryPauseStore::default());
        let handler = Arc::new(CountingHandler::new());
        let paused = paused_at_gate(ResumeTriggerKind::Manual, vec![]);
        let token = paused.approval_token;
        store.seed(paused);
        let coord = coordinator(Arc::clone(&store), Arc::clone(&handler));

        let outcome = coord
            .resume_with_approval(
                token,
                ApprovalDecision {
                    approved: true,
                    payload: None,
                },
            )
            .await
            .unwrap();

        assert!(outcome.result.success);
        assert!(!outcome.result.is_paused);
        // The gate's own completion log belongs to this resume's output,
        // alongside the downstream block's.
        assert!(
            outcome
                .result
                .logs
                .iter()
                .any(|l| l.block_id == "gate" && l.success)
        );
        assert!(outcome.result.logs.iter().any(|l| l.block_id == "after"));
        // Downstream block "after" ran exactly once.
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        // Row deleted on completion.
        assert_eq!(store.len(), 0);

        let replay = coord
            .resume_with_approval(
                token,
                ApprovalDecision {
                    approved: true,
                    payload: None,
                },
            )
            .await;
        assert!(matches!(
            replay,
            Err(ResumeError::NotFound | ResumeError::AlreadyUsed)
        ));
        // No second traversal.
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejection_short_circuits() {
        let store = Arc::new(MemoryPauseStore::default());
        let handler = Arc::new(CountingHandler::new());
        let paused = paused_at_gate(ResumeTriggerKind::Manual, vec![]);
        let token = paused.approval_token;
        store.seed(paused);
        let coord = coordinator(Arc::clone(&store), Arc::clone(&handler));

        let outcome = coord
            .resume_with_approval(
                token,
                ApprovalDecision {
                    approved: false,
                    payload: None,
                },
            )
            .await
            .unwrap();

        assert!(!outcome.result.success);
        assert_eq!(outcome.result.error.as_deref(), Some(REJECTION_MESSAGE));
        assert!(!outcome.result.is_paused);
        // No block ran, the row is gone, and the wait log is a failure.
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len(), 0);
        let gate_log = outcome
            .result
            .logs
            .iter()
            .find(|l| l.block_id == "gate")
            .unwrap();
        assert!(!gate_log.success);

        let replay = coord
            .resume_with_approval(
                token,
                ApprovalDecision {
                    approved: true,
                    payload: None,
                },
            )
            .await;
        assert!(matches!(
            replay,
            Err(ResumeError::NotFound | ResumeError::AlreadyUsed)
        ));
    }

    #[tokio::test]
    async fn api_resume_validates_before_mutation() {
        let store = Arc::new(MemoryPauseStore::default());
        let handler = Arc::new(CountingHandler::new());
        let paused = paused_at_gate(
            ResumeTriggerKind::Api,
            vec![ApiInputField {
                name: "amount".into(),
                required: true,
                field_type: Some("number".into()),
            }],
        );
        let (wid, eid) = (paused.workflow_id, paused.execution_id);
        store.seed(paused);
        let coord = coordinator(Arc::clone(&store), Arc::clone(&handler));

        let err = coord
            .resume_with_api(wid, eid, Map::new())
            .await
            .unwrap_err();
        match err {
            ResumeError::Validation(msg) => {
                assert_eq!(msg, "Missing required field: amount");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        // Nothing mutated: row still present, untouched.
        assert_eq!(store.len(), 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);

        let payload = json!({ "amount": 42 }).as_object().cloned().unwrap();
        let outcome = coord.resume_with_api(wid, eid, payload).await.unwrap();

        assert!(outcome.result.success);
        assert!(!outcome.result.is_paused);
        // Gate output carries the validated field.
        let gate_log = outcome
            .result
            .logs
            .iter()
            .find(|l| l.block_id == "gate")
            .unwrap();
        assert_eq!(gate_log.output.as_ref().unwrap()["amount"], json!(42));
        // Downstream block executed.
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn webhook_requires_deployed_context() {
        let store = Arc::new(MemoryPauseStore::default());
        let handler = Arc::new(CountingHandler::new());
        let mut paused = paused_at_gate(ResumeTriggerKind::Webhook, vec![]);
        paused.metadata.is_deployed_context = false;
        let (wid, eid) = (paused.workflow_id, paused.execution_id);
        store.seed(paused);
        let coord = coordinator(Arc::clone(&store), Arc::clone(&handler));

        let err = coord
            .resume_with_webhook(wid, eid, json!({ "event": "ping" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ResumeError::DeployedContextRequired));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn webhook_payload_nested_under_webhook_key() {
        let store = Arc::new(MemoryPauseStore::default());
        let handler = Arc::new(CountingHandler::new());
        let paused = paused_at_gate(ResumeTriggerKind::Webhook, vec![]);
        let (wid, eid) = (paused.workflow_id, paused.execution_id);
        store.seed(paused);
        let coord = coordinator(Arc::clone(&store), Arc::clone(&handler));

        let outcome = coord
            .resume_with_webhook(wid, eid, json!({ "event": "push" }))
            .await
            .unwrap();

        assert!(outcome.result.success);
        let gate_log = outcome
            .result
            .logs
            .iter()
            .find(|l| l.block_id == "gate")
            .unwrap();
        assert_eq!(
            gate_log.output.as_ref().unwrap()["webhook"]["event"],
            json!("push")
        );
    }

    #[tokio::test]
    async fn reachability_recomputed_from_stale_path() {
        let store = Arc::new(MemoryPauseStore::default());
        let handler = Arc::new(CountingHandler::new());
        let mut paused = paused_at_gate(ResumeTriggerKind::Manual, vec![]);
        let token = paused.approval_token;

        // Corrupt the stored active path and executed set; logs remain the
        // source of truth.
        let mut ctx = codec::decode(paused.context.clone()).unwrap();
        ctx.active_execution_path.clear();
        ctx.executed_blocks.clear();
        paused.context = codec::encode(&ctx).unwrap();
        store.seed(paused);
        let coord = coordinator(Arc::clone(&store), Arc::clone(&handler));

        let outcome = coord
            .resume_with_approval(
                token,
                ApprovalDecision {
                    approved: true,
                    payload: None,
                },
            )
            .await
            .unwrap();

        // "after" was reachable only through the recomputed path.
        assert!(outcome.result.success);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert!(outcome.result.logs.iter().any(|l| l.block_id == "after"));
    }

    #[tokio::test]
    async fn repause_at_second_gate_persists_new_row() {
        let store = Arc::new(MemoryPauseStore::default());
        let handler = Arc::new(CountingHandler::new());

        // start -> gate -> mid -> gate2 -> end
        let graph = WorkflowGraph {
            blocks: vec![
                task("start"),
                gate("gate", ResumeTriggerKind::Manual, vec![]),
                task("mid"),
                gate("gate2", ResumeTriggerKind::Manual, vec![]),
                task("end"),
            ],
            edges: vec![
                edge("start", "gate"),
                edge("gate", "mid"),
                edge("mid", "gate2"),
                edge("gate2", "end"),
            ],
            loops: Default::default(),
            parallels: Default::default(),
        };
        let mut paused = paused_at_gate(ResumeTriggerKind::Manual, vec![]);
        paused.workflow_graph = graph;
        let token = paused.approval_token;
        let eid = paused.execution_id;
        store.seed(paused);
        let coord = coordinator(Arc::clone(&store), Arc::clone(&handler));

        let outcome = coord
            .resume_with_approval(
                token,
                ApprovalDecision {
                    approved: true,
                    payload: None,
                },
            )
            .await
            .unwrap();

        assert!(outcome.result.is_paused);
        let row = store.get(&eid).unwrap();
        assert_eq!(row.metadata.block_id, "gate2");
        // Fresh token for the new gate.
        assert_ne!(row.approval_token, token);
        // Stored logs carry the full history for the next resume.
        assert!(row.metadata.block_logs.iter().any(|l| l.block_id == "mid"));
    }

    #[tokio::test]
    async fn child_completion_cascades_to_paused_parent() {
        let store = Arc::new(MemoryPauseStore::default());
        let handler = Arc::new(CountingHandler::new());

        // Parent: p_start -> call_child -> p_end, paused at call_child.
        let parent_graph = WorkflowGraph {
            blocks: vec![
                task("p_start"),
                Block {
                    id: "call_child".into(),
                    name: "CALL_CHILD".into(),
                    kind: BlockKind::ChildWorkflow {
                        workflow_id: Uuid::now_v7(),
                    },
                    config: json!({}),
                },
                task("p_end"),
            ],
            edges: vec![edge("p_start", "call_child"), edge("call_child", "p_end")],
            loops: Default::default(),
            parallels: Default::default(),
        };
        let mut parent = paused_at_gate(ResumeTriggerKind::Manual, vec![]);
        parent.workflow_graph = parent_graph;
        parent.metadata.block_id = "call_child".into();
        parent.metadata.block_name = "CALL_CHILD".into();
        let parent_eid = parent.execution_id;

        let mut parent_ctx = codec::decode(parent.context.clone()).unwrap();
        parent_ctx.executed_blocks.clear();
        parent_ctx.block_states.clear();
        parent_ctx.mark_executed("p_start", json!({}), 1);
        parent.context = codec::encode(&parent_ctx).unwrap();

        // Child paused at its gate, linked back to the parent.
        let mut child = paused_at_gate(ResumeTriggerKind::Manual, vec![]);
        child.metadata.parent_execution = Some(ParentExecutionInfo {
            execution_id: parent_eid,
            workflow_id: parent.workflow_id,
            workspace_id: parent.workspace_id,
            block_id: "call_child".into(),
        });
        let child_token = child.approval_token;

        store.seed(parent);
        store.seed(child);
        let coord = coordinator(Arc::clone(&store), Arc::clone(&handler));

        let outcome = coord
            .resume_with_approval(
                child_token,
                ApprovalDecision {
                    approved: true,
                    payload: None,
                },
            )
            .await
            .unwrap();

        assert!(outcome.result.success);
        // Both the child's row and the parent's row are gone: the parent was
        // itself resumed to completion.
        assert_eq!(store.len(), 0);
        // Child's "after" plus parent's "p_end" both dispatched.
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn resume_route_must_match_pause_trigger() {
        let store = Arc::new(MemoryPauseStore::default());
        let handler = Arc::new(CountingHandler::new());
        let paused = paused_at_gate(ResumeTriggerKind::Manual, vec![]);
        let (wid, eid) = (paused.workflow_id, paused.execution_id);
        store.seed(paused);
        let coord = coordinator(Arc::clone(&store), Arc::clone(&handler));

        // A manual-approval gate is not resumable through the API route,
        // the webhook route, or a schedule tick.
        let err = coord.resume_with_api(wid, eid, Map::new()).await.unwrap_err();
        assert!(matches!(err, ResumeError::Validation(_)));
        let err = coord
            .resume_with_webhook(wid, eid, json!({ "event": "ping" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ResumeError::Validation(_)));
        let err = coord.resume_on_schedule(eid).await.unwrap_err();
        assert!(matches!(err, ResumeError::Validation(_)));

        // The gate never completed and nothing ran.
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn webhook_delivery_wakes_synchronous_waiter() {
        let store = Arc::new(MemoryPauseStore::default());
        let handler = Arc::new(CountingHandler::new());
        let registry = Arc::new(ParkingRegistry::default());
        let paused = paused_before_webhook_gate(ResumeTriggerKind::Api);
        let (wid, eid) = (paused.workflow_id, paused.execution_id);
        store.seed(paused);
        let coord = Arc::new(ResumeCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::new(MemoryRunSink::default()),
            Arc::clone(&handler),
            "http://localhost:3100".into(),
        ));

        // The API resume completes the gate, then blocks at the webhook
        // wait inside the registry.
        let resume = tokio::spawn({
            let coord = Arc::clone(&coord);
            async move { coord.resume_with_api(wid, eid, Map::new()).await }
        });
        let registered = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while registry.get_wait_info(&eid, None).await.unwrap().is_none() {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(registered.is_ok(), "execution never registered its wait");

        let delivery = coord
            .resume_with_webhook(wid, eid, json!({ "event": "done" }))
            .await
            .unwrap();
        assert_eq!(delivery.result.output, json!({ "delivered": true }));

        let outcome = resume.await.unwrap().unwrap();
        assert!(outcome.result.success);
        assert!(!outcome.result.is_paused);
        let hook_log = outcome
            .result
            .logs
            .iter()
            .find(|l| l.block_id == "hook")
            .unwrap();
        assert_eq!(
            hook_log.output.as_ref().unwrap()["webhook"]["event"],
            json!("done")
        );
        // The traversal continued past the webhook wait to "finish".
        assert!(outcome.result.logs.iter().any(|l| l.block_id == "finish"));
        assert_eq!(store.len(), 0);
        assert!(registry.get_wait_info(&eid, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn synchronous_webhook_wait_times_out() {
        let store = Arc::new(MemoryPauseStore::default());
        let handler = Arc::new(CountingHandler::new());
        let paused = paused_before_webhook_gate(ResumeTriggerKind::Api);
        let (wid, eid) = (paused.workflow_id, paused.execution_id);
        store.seed(paused);
        // NullRegistry reports an immediate timeout for every wait.
        let coord = coordinator(Arc::clone(&store), Arc::clone(&handler));

        let outcome = coord.resume_with_api(wid, eid, Map::new()).await.unwrap();

        assert!(!outcome.result.success);
        assert!(!outcome.result.is_paused);
        assert_eq!(
            outcome.result.error.as_deref(),
            Some(WEBHOOK_TIMEOUT_MESSAGE)
        );
        // The webhook wait itself carries the failure log.
        let hook_log = outcome
            .result
            .logs
            .iter()
            .find(|l| l.block_id == "hook")
            .unwrap();
        assert!(!hook_log.success);
        // The failed run is not left behind as a resumable row.
        assert_eq!(store.len(), 0);
    }
}
