//! CLI subcommands that wake paused executions: resume, approve, cancel.

use anyhow::{Context, Result};
use console::style;
use serde_json::Value;
use uuid::Uuid;

use fermata_core::executor::ExecutionResult;
use fermata_core::repository::wait::WaitRegistry;
use fermata_core::resume::ApprovalDecision;

use crate::state::AppState;

fn parse_payload(raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(|s| serde_json::from_str(s).context("Invalid JSON payload"))
        .transpose()
}

fn print_result(label: &str, result: &ExecutionResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!();
    if result.is_paused {
        println!(
            "  {} {} paused again at '{}'",
            style("*").yellow().bold(),
            label,
            result
                .metadata
                .wait_block_info
                .as_ref()
                .map(|w| w.block_name.as_str())
                .unwrap_or("?")
        );
    } else if result.success {
        println!(
            "  {} {} completed ({} blocks, {} ms)",
            style("*").green().bold(),
            label,
            result.metadata.executed_block_count,
            result.metadata.duration_ms
        );
    } else {
        println!(
            "  {} {} failed: {}",
            style("*").red().bold(),
            label,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!();
    Ok(())
}

/// `fermata resume <workflow_id> <execution_id> [--payload JSON]`
pub async fn handle_resume(
    workflow_id: Uuid,
    execution_id: Uuid,
    payload: Option<&str>,
    state: &AppState,
    json: bool,
) -> Result<()> {
    let payload = match parse_payload(payload)? {
        Some(Value::Object(map)) => map,
        Some(_) => anyhow::bail!("Resume payload must be a JSON object"),
        None => serde_json::Map::new(),
    };

    let outcome = state
        .coordinator
        .resume_with_api(workflow_id, execution_id, payload)
        .await
        .map_err(|e| anyhow::anyhow!("Resume failed: {e}"))?;

    print_result("Execution", &outcome.result, json)
}

/// `fermata approve <token> [--reject] [--payload JSON]`
pub async fn handle_approve(
    token: Uuid,
    reject: bool,
    payload: Option<&str>,
    state: &AppState,
    json: bool,
) -> Result<()> {
    let decision = ApprovalDecision {
        approved: !reject,
        payload: parse_payload(payload)?,
    };

    let outcome = state
        .coordinator
        .resume_with_approval(token, decision)
        .await
        .map_err(|e| anyhow::anyhow!("Approval failed: {e}"))?;

    let label = if reject { "Rejection" } else { "Approval" };
    print_result(label, &outcome.result, json)
}

/// `fermata cancel <execution_id>`
pub async fn handle_cancel(execution_id: Uuid, state: &AppState, json: bool) -> Result<()> {
    let cancelled = state
        .registry
        .cancel_wait(&execution_id)
        .await
        .map_err(|e| anyhow::anyhow!("Cancel failed: {e}"))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "cancelled": cancelled }))?
        );
        return Ok(());
    }

    println!();
    if cancelled {
        println!(
            "  {} Cancelled wait for execution {}",
            style("*").green().bold(),
            style(execution_id).cyan()
        );
    } else {
        println!("  No registered wait for execution {execution_id}.");
    }
    println!();

    Ok(())
}
