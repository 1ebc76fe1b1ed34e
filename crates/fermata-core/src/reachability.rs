//! Active-path recomputation.
//!
//! The persisted active path is never trusted verbatim at resume time: the
//! path must reflect the frozen graph's current topology, and an earlier
//! serialization bug can leave it empty or partial. Every resume path calls
//! the one function here so the behavior cannot drift between call sites.

use std::collections::HashSet;

use fermata_types::graph::{BlockKind, WorkflowGraph};

use crate::context::ExecutionContext;

/// Rebuild `active_execution_path` by forward closure from the executed set.
///
/// Every executed block id (plus `resumed_block`, the wait block being
/// completed right now) is added to the path, then every edge target whose
/// source is in that set. At router and condition fan-outs, a recorded
/// decision restricts successors to the chosen branch; without one, all
/// targets are added.
pub fn rebuild_active_path(
    ctx: &mut ExecutionContext,
    graph: &WorkflowGraph,
    resumed_block: &str,
) {
    let mut sources: HashSet<&str> = ctx
        .executed_blocks
        .iter()
        .map(String::as_str)
        .collect();
    sources.insert(resumed_block);

    let mut path: HashSet<String> = sources.iter().map(|s| s.to_string()).collect();

    for edge in &graph.edges {
        if !sources.contains(edge.source.as_str()) {
            continue;
        }
        if !edge_follows_decision(ctx, graph, &edge.source, edge.source_handle.as_deref()) {
            continue;
        }
        path.insert(edge.target.clone());
    }

    ctx.active_execution_path = path;
}

/// Whether an edge out of `source` is consistent with the recorded decision
/// at that block, if any.
fn edge_follows_decision(
    ctx: &ExecutionContext,
    graph: &WorkflowGraph,
    source: &str,
    source_handle: Option<&str>,
) -> bool {
    let Some(block) = graph.block(source) else {
        return true;
    };
    match &block.kind {
        BlockKind::Router => match ctx.decisions.router.get(source) {
            Some(chosen) => source_handle == Some(chosen.as_str()),
            None => true,
        },
        BlockKind::Condition => match ctx.decisions.condition.get(source) {
            Some(chosen) => source_handle == Some(chosen.as_str()),
            None => true,
        },
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fermata_types::graph::{Block, BlockKind, Edge, WorkflowGraph};
    use serde_json::json;
    use uuid::Uuid;

    fn block(id: &str, kind: BlockKind) -> Block {
        Block {
            id: id.to_string(),
            name: id.to_uppercase(),
            kind,
            config: json!({}),
        }
    }

    fn edge(source: &str, target: &str, handle: Option<&str>) -> Edge {
        Edge {
            source: source.to_string(),
            target: target.to_string(),
            source_handle: handle.map(str::to_string),
        }
    }

    fn task(id: &str) -> Block {
        block(id, BlockKind::Task { block_type: "noop".into() })
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7())
    }

    #[test]
    fn recomputes_from_empty_stale_path() {
        // a -> b -> gate -> c -> d, with a and b executed, resuming at gate.
        let graph = WorkflowGraph {
            blocks: vec![task("a"), task("b"), task("gate"), task("c"), task("d")],
            edges: vec![
                edge("a", "b", None),
                edge("b", "gate", None),
                edge("gate", "c", None),
                edge("c", "d", None),
            ],
            loops: Default::default(),
            parallels: Default::default(),
        };

        let mut ctx = ctx();
        ctx.executed_blocks.insert("a".into());
        ctx.executed_blocks.insert("b".into());
        ctx.active_execution_path.clear();

        rebuild_active_path(&mut ctx, &graph, "gate");

        // Executed blocks come back, plus every direct successor.
        for id in ["a", "b", "gate", "c"] {
            assert!(ctx.active_execution_path.contains(id), "missing {id}");
        }
        // d is two hops past the resumed block, not a direct successor.
        assert!(!ctx.active_execution_path.contains("d"));
    }

    #[test]
    fn router_decision_prunes_unchosen_branch() {
        let graph = WorkflowGraph {
            blocks: vec![task("gate"), block("route", BlockKind::Router), task("x"), task("y")],
            edges: vec![
                edge("gate", "route", None),
                edge("route", "x", Some("x")),
                edge("route", "y", Some("y")),
            ],
            loops: Default::default(),
            parallels: Default::default(),
        };

        let mut ctx = ctx();
        ctx.executed_blocks.insert("route".into());
        ctx.set_router_decision("route", "y");

        rebuild_active_path(&mut ctx, &graph, "gate");

        assert!(ctx.active_execution_path.contains("y"));
        assert!(!ctx.active_execution_path.contains("x"));
    }

    #[test]
    fn undecided_fanout_keeps_all_targets() {
        let graph = WorkflowGraph {
            blocks: vec![block("cond", BlockKind::Condition), task("t"), task("f")],
            edges: vec![
                edge("cond", "t", Some("true")),
                edge("cond", "f", Some("false")),
            ],
            loops: Default::default(),
            parallels: Default::default(),
        };

        let mut ctx = ctx();
        ctx.executed_blocks.insert("cond".into());

        rebuild_active_path(&mut ctx, &graph, "cond");

        assert!(ctx.active_execution_path.contains("t"));
        assert!(ctx.active_execution_path.contains("f"));
    }
}
