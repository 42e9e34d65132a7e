//! ScoreHub background worker
//!
//! Entry point that loads configuration, brings up the job queue and the
//! scheduler, and keeps them running until a shutdown signal arrives.

use anyhow::Context;
use clap::Parser;
use scorehub_workflows::{Collaborators, WorkflowOrchestrator};

mod cli;
mod tracing_setup;

use cli::CliArgs;
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = load_config(args.config_path.as_deref())?;
    if args.check_config {
        scorehub_config::validate_config(&config).context("invalid configuration")?;
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    install_tracing_from_config(&config.logging);
    tracing::info!(
        config_path = args.config_path.as_deref().unwrap_or("-"),
        data_dir = %config.queue.data_dir,
        timezone = %config.scheduler.timezone,
        "scorehub worker starting"
    );

    let orchestrator = WorkflowOrchestrator::new(config, Collaborators::default());
    orchestrator
        .initialize()
        .await
        .context("failed to initialize workflow system")?;

    let status = orchestrator.get_system_status().await;
    tracing::info!(
        queues = status.queues.len(),
        tasks = status.tasks.len(),
        scheduler_running = status.scheduler_running,
        "scorehub worker ready"
    );

    shutdown_signal().await;
    orchestrator.shutdown().await;
    Ok(())
}

fn load_config(path: Option<&str>) -> anyhow::Result<scorehub_config::Config> {
    let loaded = match path {
        Some(p) => scorehub_config::load_config(Some(p)),
        None => scorehub_config::load_config::<&std::path::Path>(None),
    };
    loaded.map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
