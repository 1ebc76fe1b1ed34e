//! Default block dispatcher for the server binary.
//!
//! Per-block execution is a deployment concern; real installations wire
//! their own `BlockHandler` with domain block types. This dispatcher keeps
//! graphs traversable without one: ordinary blocks echo their configured
//! output, and branch blocks read their chosen handle from config.

use fermata_core::context::ExecutionContext;
use fermata_core::executor::{BlockHandler, EngineError, HandlerOutput};
use fermata_types::graph::{Block, BlockKind};
use serde_json::{Value, json};

/// Echoes block configuration as output.
///
/// - Task blocks return `config.output` when present, else the whole config.
/// - Router blocks branch on `config.route`, condition blocks on
///   `config.branch`; a missing key leaves fan-out unrestricted.
/// - Child-workflow blocks return their config; nested dispatch belongs to
///   a domain handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughHandler;

impl BlockHandler for PassthroughHandler {
    async fn execute(
        &self,
        block: &Block,
        _ctx: &ExecutionContext,
    ) -> Result<HandlerOutput, EngineError> {
        let output = block
            .config
            .get("output")
            .cloned()
            .unwrap_or_else(|| block.config.clone());

        let handle_key = match &block.kind {
            BlockKind::Router => Some("route"),
            BlockKind::Condition => Some("branch"),
            _ => None,
        };

        if let Some(key) = handle_key
            && let Some(Value::String(handle)) = block.config.get(key)
        {
            return Ok(HandlerOutput::branch(output, handle.clone()));
        }

        tracing::debug!(
            block_id = %block.id,
            block_type = %block.kind.type_name(),
            "passthrough block executed"
        );

        if output.is_null() {
            return Ok(HandlerOutput::value(json!({})));
        }
        Ok(HandlerOutput::value(output))
    }
}
