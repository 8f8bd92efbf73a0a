use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::time::Duration;

use crate::client::{DaemonClient, stop_daemon};
use crate::error::DaemonError;
use crate::models::Config;
use crate::server::run_daemon;

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(subcommand)]
    pub command: Option<ServeCommand>,

    #[arg(long, hide = true)]
    pub daemon: bool,

    #[arg(long, hide = true)]
    pub foreground: bool,
}

#[derive(Debug, Subcommand)]
pub enum ServeCommand {
    /// Stop the running daemon
    Stop,
    /// Stop the daemon and start a fresh one (the index starts empty)
    Restart,
}

pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let config = Config::load()?;

    if args.daemon {
        return run_daemon(config).await.context("daemon exited with error");
    }

    if args.foreground {
        eprintln!("Starting daemon in foreground mode...");
        return run_daemon(config).await.context("daemon exited with error");
    }

    match args.command {
        Some(ServeCommand::Stop) => handle_stop(&config),
        Some(ServeCommand::Restart) => handle_restart(&config).await,
        None => handle_start(&config).await,
    }
}

async fn handle_start(config: &Config) -> Result<()> {
    let client = DaemonClient::new(config);

    if client.is_running() {
        println!("Daemon is already running");
        return Ok(());
    }

    // Starting explicitly should work even when auto_start is off.
    let mut config = config.clone();
    config.daemon.auto_start = true;
    DaemonClient::new(&config)
        .ensure_running()
        .await
        .context("failed to start daemon")?;

    println!("Daemon started");
    println!("Socket: {}", config.socket_path().display());
    Ok(())
}

fn handle_stop(config: &Config) -> Result<()> {
    match stop_daemon(config) {
        Ok(()) => {
            println!("Daemon stopped");
            Ok(())
        }
        Err(DaemonError::NotRunning) => {
            println!("Daemon is not running");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_restart(config: &Config) -> Result<()> {
    if let Err(e) = stop_daemon(config)
        && !matches!(e, DaemonError::NotRunning)
    {
        return Err(e).context("failed to stop daemon");
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    handle_start(config).await
}
