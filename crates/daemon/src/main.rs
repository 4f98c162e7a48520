// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wardend: agent control plane.
//!
//! `serve` holds the state root and supervises the runtime (local mode) or
//! fronts the orchestrator (remote mode). The remaining subcommands are
//! one-shot operations against the same state root.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use warden_core::{AgentId, ProvisionStatus};
use warden_daemon::lifecycle::{self, Config};

#[derive(Parser, Debug)]
#[command(name = "wardend", version, about = "Agent lifecycle and state sync control plane")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the control plane until SIGTERM or Ctrl-C
    Serve,
    /// Provision compute for a user
    Provision { user: String },
    /// Show a user's lifecycle state
    Status { user: String },
    /// Tear down a user's compute
    Deprovision { user: String },
    /// Print a running user's base URL
    Endpoint { user: String },
    /// Upload an agent's directories to the blob store
    Snapshot { agent: String },
    /// Restore every agent with a snapshot in the blob store
    RestoreAll,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Command::Serve => {
            let _guard = init_file_logging(&config)?;
            serve(config).await
        }
        command => {
            init_stderr_logging();
            run_once(command, &config).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let daemon = lifecycle::startup(&config).await.context("control plane failed to start")?;
    let snapshots = daemon.spawn_snapshot_loop();

    println!("READY");
    shutdown_signal().await;

    if let Some(handle) = snapshots {
        handle.abort();
    }
    daemon.shutdown().await?;
    Ok(())
}

async fn run_once(command: Command, config: &Config) -> anyhow::Result<()> {
    let services = lifecycle::connect(config).await?;
    let control = &services.control;

    match command {
        Command::Serve => bail!("serve is not a one-shot command"),
        Command::Provision { user } => print_status(&control.provision(&agent_id(&user)?).await?),
        Command::Status { user } => print_status(&control.status(&agent_id(&user)?).await?),
        Command::Deprovision { user } => {
            print_status(&control.deprovision(&agent_id(&user)?).await?)
        }
        Command::Endpoint { user } => {
            let Some(endpoint) = control.endpoint(&agent_id(&user)?).await? else {
                bail!("{user} is not running");
            };
            println!("{}", endpoint.base_url());
            Ok(())
        }
        Command::Snapshot { agent } => {
            let id = agent_id(&agent)?;
            services.sync.snapshot_agent(&id, &services.layout).await?;
            println!("snapshotted {id}");
            Ok(())
        }
        Command::RestoreAll => {
            let restored = services.sync.restore_all(&services.layout).await?;
            println!("restored {restored} agent(s)");
            Ok(())
        }
    }
}

/// Agent IDs name directories under the state root.
fn agent_id(arg: &str) -> anyhow::Result<AgentId> {
    let id = AgentId::new(arg);
    id.validate()?;
    Ok(id)
}

fn print_status(status: &ProvisionStatus) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(status)?);
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to `<state>/wardend.log` through a non-blocking writer. The returned
/// guard flushes on drop and must outlive the server.
fn init_file_logging(
    config: &Config,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&config.state_dir)?;
    let file_name = config.log_path.file_name().context("log path has no file name")?;
    let appender = tracing_appender::rolling::never(&config.state_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    info!(log = %config.log_path.display(), "logging initialized");
    Ok(guard)
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl-C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
