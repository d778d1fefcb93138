//! mdok agent - foreground collector for a named container group
//!
//! Samples every container of a saved monitoring config until interrupted,
//! then writes the final summaries.

use anyhow::{Context, Result};
use clap::Parser;
use mdok_lib::{connect_docker, CollectionLoopBuilder, SeriesStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Collect metrics for a saved monitoring config
#[derive(Parser)]
#[command(name = "mdok-agent")]
#[command(author, version, about = "Collect container metrics for a monitoring config", long_about = None)]
struct Args {
    /// Name of the monitoring config to run
    config_name: String,

    /// Data directory (overrides the configured one)
    #[arg(long, env = "MDOK_HOME")]
    data_dir: Option<PathBuf>,

    /// Agent options file (TOML, YAML or JSON)
    #[arg(long, short)]
    options: Option<PathBuf>,

    /// Pricing region for egress cost estimates
    #[arg(long)]
    region: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let args = Args::parse();
    info!(version = AGENT_VERSION, "Starting mdok-agent");

    let mut options = config::AgentOptions::load(args.options.as_deref())?;
    if let Some(dir) = args.data_dir {
        options.data_dir = dir;
    }
    if args.region.is_some() {
        options.region = args.region;
    }
    info!(data_dir = %options.data_dir.display(), "Agent configured");

    let store = SeriesStore::new(&options.data_dir);
    let monitor = store
        .load_config(&args.config_name)
        .with_context(|| format!("Failed to load config '{}'", args.config_name))?;

    let client = connect_docker()?;
    let mut builder = CollectionLoopBuilder::new()
        .client(client)
        .store(store)
        .monitor(monitor)
        .region(options.region.clone())
        .proxy_patterns(options.proxy_patterns.clone());
    if let Some(limit) = options.max_concurrency {
        builder = builder.max_concurrency(limit);
    }
    let collection = Arc::new(builder.build()?);

    if let Err(e) = collection.start().await {
        error!(error = %e, "Failed to start monitoring");
        std::process::exit(1);
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        let signal = shutdown_signal().await;
        info!(signal, "Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    collection.run(shutdown_rx).await;
    info!("Shutting down");

    Ok(())
}

/// Wait for Ctrl-C, or SIGTERM on unix, and name the one that fired
async fn shutdown_signal() -> &'static str {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for interrupt");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::signal::unix::{signal, SignalKind};

    #[tokio::test]
    async fn test_sigterm_triggers_shutdown() {
        // Keeps the handler installed so the signal never reaches the default action
        let _guard = signal(SignalKind::terminate()).unwrap();

        let waiter = tokio::spawn(shutdown_signal());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let fired = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("shutdown signal not observed")
            .unwrap();
        assert_eq!(fired, "SIGTERM");
    }
}
