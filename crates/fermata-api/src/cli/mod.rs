//! CLI command definitions and dispatch for the `fermata` binary.
//!
//! Uses clap derive macros for argument parsing. The CLI follows a
//! verb-noun pattern (e.g., `fermata paused list`, `fermata resume`).

pub mod paused;
pub mod resume;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use uuid::Uuid;

/// Pause and resume workflow executions.
#[derive(Parser)]
#[command(name = "fermata", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server and schedule sweeper.
    Serve {
        /// Port to listen on (overrides the configured listen address).
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (overrides the configured listen address).
        #[arg(long)]
        host: Option<String>,

        /// Export traces via OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,
    },

    /// Inspect paused executions.
    Paused {
        #[command(subcommand)]
        action: paused::PausedCommand,
    },

    /// Resume a paused execution with an API payload.
    Resume {
        /// Workflow the execution belongs to.
        workflow_id: Uuid,

        /// The paused execution.
        execution_id: Uuid,

        /// JSON payload matching the wait block's input schema.
        #[arg(long)]
        payload: Option<String>,
    },

    /// Approve or reject a paused execution via its one-time token.
    Approve {
        /// The one-time approval token.
        token: Uuid,

        /// Reject instead of approving.
        #[arg(long)]
        reject: bool,

        /// Optional JSON payload (edited content or custom form fields).
        #[arg(long)]
        payload: Option<String>,
    },

    /// Cancel a registered synchronous wait.
    Cancel {
        /// The waiting execution.
        execution_id: Uuid,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}
