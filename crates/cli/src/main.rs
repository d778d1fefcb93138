//! mdok CLI
//!
//! Manages monitoring configs and reports on collected container data:
//! sessions, summaries and exports.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{configs, export, sessions, summary, FilterArgs};
use mdok_lib::config::DEFAULT_INTERVAL_SECS;
use mdok_lib::SeriesStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Container group monitoring CLI
#[derive(Parser)]
#[command(name = "mdok")]
#[command(author, version, about = "Monitor Docker container groups and report on their resource usage", long_about = None)]
pub struct Cli {
    /// Data directory (default: ~/.mdok)
    #[arg(long, env = "MDOK_HOME")]
    pub home: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List saved monitoring configs
    Configs,

    /// Save a monitoring config for a group of containers
    Create {
        /// Config name
        name: String,

        /// Container names or ids
        #[arg(required = true, num_args = 1..)]
        containers: Vec<String>,

        /// Sampling interval in seconds
        #[arg(long, short, default_value_t = DEFAULT_INTERVAL_SECS)]
        interval: u64,

        /// Replace an existing config with the same name
        #[arg(long)]
        force: bool,
    },

    /// Delete a config and all of its collected data
    Delete {
        /// Config name
        name: String,
    },

    /// List the monitoring sessions of a config
    Sessions {
        /// Config name
        name: String,
    },

    /// Show per-container summaries
    Summary {
        /// Config name
        name: String,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Export collected data as json, csv, markdown or html
    Export {
        /// Config name
        name: String,

        /// Export format: json, csv, markdown or html
        #[arg(long = "as", default_value = "json")]
        export_format: String,

        /// Output file path (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

fn data_dir(home: Option<PathBuf>) -> Result<PathBuf> {
    match home {
        Some(dir) => Ok(dir),
        None => {
            let home = dirs_next::home_dir().context("Could not determine home directory")?;
            Ok(home.join(".mdok"))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let store = SeriesStore::new(data_dir(cli.home)?);
    tracing::debug!(root = %store.root().display(), "Using data directory");

    match cli.command {
        Commands::Configs => configs::list_configs(&store, cli.format)?,
        Commands::Create {
            name,
            containers,
            interval,
            force,
        } => configs::create_config(&store, &name, containers, interval, force)?,
        Commands::Delete { name } => configs::delete_config(&store, &name)?,
        Commands::Sessions { name } => sessions::list_sessions(&store, &name, cli.format)?,
        Commands::Summary { name, filter } => {
            summary::show_summary(&store, &name, &filter, cli.format)?
        }
        Commands::Export {
            name,
            export_format,
            output,
            filter,
        } => export::export_run(&store, &name, &export_format, output.as_deref(), &filter)?,
    }

    Ok(())
}
