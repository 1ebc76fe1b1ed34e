//! CLI subcommands for inspecting paused executions.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use fermata_core::repository::pause::PauseStore;

use crate::state::AppState;

/// Paused-execution subcommands.
#[derive(Subcommand)]
pub enum PausedCommand {
    /// List live pauses for a workflow.
    List {
        /// Workflow to list pauses for.
        workflow_id: Uuid,

        /// Narrow to pauses at one wait block.
        #[arg(long)]
        block_id: Option<String>,
    },

    /// Show detail for one paused execution.
    Show {
        /// The paused execution.
        execution_id: Uuid,
    },
}

/// Handle a paused subcommand.
pub async fn handle_paused_command(cmd: PausedCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        PausedCommand::List {
            workflow_id,
            block_id,
        } => handle_list(&workflow_id, block_id.as_deref(), state, json).await,
        PausedCommand::Show { execution_id } => handle_show(&execution_id, state, json).await,
    }
}

async fn handle_list(
    workflow_id: &Uuid,
    block_id: Option<&str>,
    state: &AppState,
    json: bool,
) -> Result<()> {
    let summaries = state
        .store
        .list_for_workflow(workflow_id, block_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list paused executions: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!();
        println!("  No paused executions for workflow {workflow_id}.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Execution").fg(Color::Cyan),
            Cell::new("Block"),
            Cell::new("Trigger"),
            Cell::new("Paused at"),
        ]);

    for s in &summaries {
        table.add_row(vec![
            Cell::new(s.execution_id),
            Cell::new(&s.block_id),
            Cell::new(s.trigger.as_str()),
            Cell::new(s.paused_at.to_rfc3339()),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

async fn handle_show(execution_id: &Uuid, state: &AppState, json: bool) -> Result<()> {
    let paused = state
        .store
        .load(execution_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load paused execution: {e}"))?
        .ok_or_else(|| anyhow::anyhow!("No paused execution {execution_id}"))?;

    if json {
        let out = serde_json::json!({
            "execution_id": paused.execution_id,
            "workflow_id": paused.workflow_id,
            "workspace_id": paused.workspace_id,
            "block_id": paused.metadata.block_id,
            "block_name": paused.metadata.block_name,
            "trigger": paused.metadata.trigger,
            "is_deployed_context": paused.metadata.is_deployed_context,
            "parent_execution": paused.metadata.parent_execution,
            "paused_at": paused.metadata.paused_at,
            "updated_at": paused.updated_at,
            "log_count": paused.metadata.block_logs.len(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Execution {} paused at '{}'",
        style("*").yellow().bold(),
        style(paused.execution_id).cyan(),
        style(&paused.metadata.block_name).cyan()
    );
    println!("  Workflow: {}", paused.workflow_id);
    println!("  Block: {}", paused.metadata.block_id);
    println!(
        "  Trigger: {}",
        paused.metadata.trigger.as_str()
    );
    println!("  Paused at: {}", paused.metadata.paused_at.to_rfc3339());
    println!("  Logs so far: {}", paused.metadata.block_logs.len());
    if let Some(parent) = &paused.metadata.parent_execution {
        println!(
            "  Parent: execution {} (block {})",
            parent.execution_id, parent.block_id
        );
    }
    println!();

    Ok(())
}
