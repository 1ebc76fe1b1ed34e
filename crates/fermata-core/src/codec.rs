//! Durable serialization of the execution context.
//!
//! The persisted form stores every map as an ordered list of `[key, value]`
//! pairs and every set as a list, so the stored document is byte-stable for
//! the same logical state regardless of hash ordering. The decoder is
//! tolerant on the way back in: each map field accepts either the pair-list
//! shape or a plain JSON object (documents written by older builds used
//! objects), and any missing collection decodes as empty rather than
//! failing the whole document.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use fermata_types::execution::{
    BlockLog, BlockState, ContextMetadata, Decisions, LoopExecution, ParallelBlockMapping,
    ParallelExecution, StreamingConfig,
};
use fermata_types::graph::WorkflowGraph;

use crate::context::ExecutionContext;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode execution context: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode execution context: {0}")]
    Decode(#[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Tolerant map shape
// ---------------------------------------------------------------------------

/// A map field in the durable document: either the canonical pair-list
/// shape or a plain object.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum PairsOrMap<T> {
    Pairs(Vec<(String, T)>),
    Map(HashMap<String, T>),
}

impl<T> PairsOrMap<T> {
    fn into_map(self) -> HashMap<String, T> {
        match self {
            PairsOrMap::Pairs(pairs) => pairs.into_iter().collect(),
            PairsOrMap::Map(map) => map,
        }
    }
}

fn encode_map<T: Clone>(map: &HashMap<String, T>) -> Vec<(String, T)> {
    let mut pairs: Vec<(String, T)> = map
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

fn encode_set(set: &HashSet<String>) -> Vec<String> {
    let mut items: Vec<String> = set.iter().cloned().collect();
    items.sort();
    items
}

fn default_pairs<T>() -> PairsOrMap<T> {
    PairsOrMap::Pairs(Vec::new())
}

// ---------------------------------------------------------------------------
// Durable document
// ---------------------------------------------------------------------------

/// The wire/storage shape of an `ExecutionContext`.
///
/// Field names are part of the stored format; renaming one breaks every
/// pause persisted before the rename.
#[derive(Debug, Serialize, Deserialize)]
pub struct DurableContext {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub workspace_id: Uuid,

    #[serde(default = "default_pairs")]
    block_states: PairsOrMap<BlockState>,
    #[serde(default)]
    executed_blocks: Vec<String>,
    #[serde(default)]
    active_execution_path: Vec<String>,
    #[serde(default)]
    decisions: Decisions,

    #[serde(default = "default_pairs")]
    loop_iterations: PairsOrMap<u32>,
    #[serde(default = "default_pairs")]
    loop_items: PairsOrMap<Value>,
    #[serde(default)]
    completed_loops: Vec<String>,
    #[serde(default = "default_pairs")]
    loop_executions: PairsOrMap<LoopExecution>,
    #[serde(default = "default_pairs")]
    parallel_executions: PairsOrMap<ParallelExecution>,
    #[serde(default = "default_pairs")]
    parallel_block_mapping: PairsOrMap<ParallelBlockMapping>,

    #[serde(default)]
    block_logs: Vec<BlockLog>,
    #[serde(default)]
    metadata: ContextMetadata,

    #[serde(default = "default_pairs")]
    environment_variables: PairsOrMap<Value>,
    #[serde(default = "default_pairs")]
    workflow_variables: PairsOrMap<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workflow: Option<WorkflowGraph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    streaming: Option<StreamingConfig>,
}

/// Encode a context into its durable JSON value.
pub fn encode(ctx: &ExecutionContext) -> Result<Value, CodecError> {
    let doc = DurableContext {
        execution_id: ctx.execution_id,
        workflow_id: ctx.workflow_id,
        workspace_id: ctx.workspace_id,
        block_states: PairsOrMap::Pairs(encode_map(&ctx.block_states)),
        executed_blocks: encode_set(&ctx.executed_blocks),
        active_execution_path: encode_set(&ctx.active_execution_path),
        decisions: ctx.decisions.clone(),
        loop_iterations: PairsOrMap::Pairs(encode_map(&ctx.loop_iterations)),
        loop_items: PairsOrMap::Pairs(encode_map(&ctx.loop_items)),
        completed_loops: encode_set(&ctx.completed_loops),
        loop_executions: PairsOrMap::Pairs(encode_map(&ctx.loop_executions)),
        parallel_executions: PairsOrMap::Pairs(encode_map(&ctx.parallel_executions)),
        parallel_block_mapping: PairsOrMap::Pairs(encode_map(&ctx.parallel_block_mapping)),
        block_logs: ctx.block_logs.clone(),
        metadata: ctx.metadata.clone(),
        environment_variables: PairsOrMap::Pairs(encode_map(&ctx.environment_variables)),
        workflow_variables: PairsOrMap::Pairs(encode_map(&ctx.workflow_variables)),
        workflow: ctx.workflow.clone(),
        streaming: ctx.streaming.clone(),
    };
    serde_json::to_value(&doc).map_err(CodecError::Encode)
}

/// Decode a durable JSON value back into a live context.
///
/// Transient pause-control state never survives the round trip:
/// `should_pause_after_block` always comes back false, so a resumed
/// context does not immediately re-pause.
pub fn decode(value: Value) -> Result<ExecutionContext, CodecError> {
    let doc: DurableContext = serde_json::from_value(value).map_err(CodecError::Decode)?;
    Ok(ExecutionContext {
        execution_id: doc.execution_id,
        workflow_id: doc.workflow_id,
        workspace_id: doc.workspace_id,
        block_states: doc.block_states.into_map(),
        executed_blocks: doc.executed_blocks.into_iter().collect(),
        active_execution_path: doc.active_execution_path.into_iter().collect(),
        decisions: doc.decisions,
        loop_iterations: doc.loop_iterations.into_map(),
        loop_items: doc.loop_items.into_map(),
        completed_loops: doc.completed_loops.into_iter().collect(),
        loop_executions: doc.loop_executions.into_map(),
        parallel_executions: doc.parallel_executions.into_map(),
        parallel_block_mapping: doc.parallel_block_mapping.into_map(),
        block_logs: doc.block_logs,
        metadata: doc.metadata,
        environment_variables: doc.environment_variables.into_map(),
        workflow_variables: doc.workflow_variables.into_map(),
        workflow: doc.workflow,
        streaming: doc.streaming,
        should_pause_after_block: false,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_context() -> ExecutionContext {
        let mut ctx = ExecutionContext::new(Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        ctx.mark_executed("start", json!({"ok": true}), 3);
        ctx.mark_executed("fetch", json!({"rows": 4}), 120);
        ctx.active_execution_path.insert("gate".into());
        ctx.set_router_decision("route1", "branch_b");
        ctx.loop_iterations.insert("loop1".into(), 2);
        ctx.environment_variables
            .insert("API_BASE".into(), json!("https://api.example.test"));
        ctx
    }

    #[test]
    fn round_trip_preserves_state() {
        let ctx = sample_context();
        let encoded = encode(&ctx).unwrap();
        let decoded = decode(encoded).unwrap();

        assert_eq!(decoded.execution_id, ctx.execution_id);
        assert_eq!(decoded.executed_blocks, ctx.executed_blocks);
        assert_eq!(decoded.active_execution_path, ctx.active_execution_path);
        assert_eq!(decoded.decisions.router["route1"], "branch_b");
        assert_eq!(decoded.loop_iterations["loop1"], 2);
        assert_eq!(
            decoded.environment_variables["API_BASE"],
            json!("https://api.example.test")
        );
        assert_eq!(
            decoded.block_states["fetch"].output,
            json!({"rows": 4})
        );
    }

    #[test]
    fn maps_encode_as_sorted_pairs() {
        let ctx = sample_context();
        let encoded = encode(&ctx).unwrap();

        let states = encoded["block_states"].as_array().unwrap();
        let keys: Vec<&str> = states
            .iter()
            .map(|pair| pair[0].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["fetch", "start"]);

        let executed = encoded["executed_blocks"].as_array().unwrap();
        assert_eq!(executed, &[json!("fetch"), json!("start")]);
    }

    #[test]
    fn encode_is_deterministic() {
        let ctx = sample_context();
        let a = serde_json::to_string(&encode(&ctx).unwrap()).unwrap();
        let b = serde_json::to_string(&encode(&ctx).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn decode_accepts_plain_object_maps() {
        let doc = json!({
            "execution_id": Uuid::now_v7(),
            "workflow_id": Uuid::now_v7(),
            "workspace_id": Uuid::now_v7(),
            "block_states": {
                "start": {"output": {"ok": true}, "executed": true, "execution_time_ms": 5}
            },
            "executed_blocks": ["start"],
            "loop_iterations": {"loop1": 3},
        });

        let ctx = decode(doc).unwrap();
        assert!(ctx.is_executed("start"));
        assert_eq!(ctx.loop_iterations["loop1"], 3);
        assert!(ctx.block_logs.is_empty());
    }

    #[test]
    fn decode_tolerates_missing_collections() {
        let doc = json!({
            "execution_id": Uuid::now_v7(),
            "workflow_id": Uuid::now_v7(),
            "workspace_id": Uuid::now_v7(),
        });

        let ctx = decode(doc).unwrap();
        assert!(ctx.executed_blocks.is_empty());
        assert!(ctx.block_states.is_empty());
        assert!(!ctx.should_pause_after_block);
    }

    #[test]
    fn pause_flag_never_survives_round_trip() {
        let mut ctx = sample_context();
        ctx.should_pause_after_block = true;
        let decoded = decode(encode(&ctx).unwrap()).unwrap();
        assert!(!decoded.should_pause_after_block);
    }
}
