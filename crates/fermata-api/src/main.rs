//! Fermata CLI and REST API entry point.
//!
//! Binary name: `fermata`
//!
//! Parses CLI arguments, initializes the database and coordinator, then
//! dispatches to the appropriate command handler or starts the REST API
//! server with the schedule sweeper.

mod cli;
mod handler;
mod http;
mod state;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap_complete::generate;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "fermata", &mut std::io::stdout());
        return Ok(());
    }

    // Set up tracing based on verbosity; `serve --otel` additionally
    // bridges spans to OpenTelemetry.
    let otel = matches!(&cli.command, Commands::Serve { otel: true, .. });
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 if otel => "info",
        0 => "warn",
        1 => "info,fermata=debug",
        _ => "trace",
    };
    fermata_observe::tracing_setup::init_tracing(filter, otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Initialize application state (DB, coordinator)
    let state = AppState::init().await?;

    match cli.command {
        Commands::Serve { port, host, .. } => {
            serve(state, host.as_deref(), port).await?;
        }

        Commands::Paused { action } => {
            cli::paused::handle_paused_command(action, &state, cli.json).await?;
        }

        Commands::Resume {
            workflow_id,
            execution_id,
            payload,
        } => {
            cli::resume::handle_resume(
                workflow_id,
                execution_id,
                payload.as_deref(),
                &state,
                cli.json,
            )
            .await?;
        }

        Commands::Approve {
            token,
            reject,
            payload,
        } => {
            cli::resume::handle_approve(token, reject, payload.as_deref(), &state, cli.json)
                .await?;
        }

        Commands::Cancel { execution_id } => {
            cli::resume::handle_cancel(execution_id, &state, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    if otel {
        fermata_observe::tracing_setup::shutdown_tracing();
    }

    Ok(())
}

/// Run the REST API server and schedule sweeper until Ctrl+C or SIGTERM.
async fn serve(state: AppState, host: Option<&str>, port: Option<u16>) -> anyhow::Result<()> {
    // Ensure an API key exists, print it if new
    let api_key = http::extractors::auth::ensure_api_key(&state).await?;
    if api_key.starts_with("fmta_") {
        println!();
        println!(
            "  {} API key generated (save this -- it won't be shown again):",
            console::style("*").bold()
        );
        println!();
        println!("  {}", console::style(&api_key).yellow().bold());
        println!();
    }

    // CLI flags override the configured listen address.
    let addr = match (host, port) {
        (None, None) => state.config.listen_addr.clone(),
        (h, p) => format!("{}:{}", h.unwrap_or("127.0.0.1"), p.unwrap_or(3100)),
    };
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Fermata API listening on {}",
        console::style("*").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let shutdown = CancellationToken::new();
    let sweeper = fermata_infra::sweeper::spawn_schedule_sweeper(
        Arc::clone(&state.store),
        Arc::clone(&state.coordinator),
        Duration::from_secs(state.config.schedule_sweep_interval_secs),
        shutdown.clone(),
    );

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    let _ = sweeper.await;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
