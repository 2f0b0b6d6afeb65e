mod apply;
mod calendar;
mod commands;
mod render;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calmirror")]
#[command(about = "Mirror events from a source calendar into a target calendar, one way")]
struct Cli {
    /// Sync directory (holds .calmirror/config.toml)
    #[arg(short = 'C', long, global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile and apply once
    Sync {
        /// List every planned action
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show what a sync would do, without applying
    Status {
        /// List every planned action
        #[arg(short, long)]
        verbose: bool,
    },
    /// Delete all mirrored events from the target calendar
    Purge {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Sync on a fixed interval until interrupted
    Watch {
        /// Delay between cycles (e.g. "5m", "90s"); overrides the config
        #[arg(short, long)]
        interval: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync { verbose } => commands::sync::run(&cli.dir, verbose),
        Commands::Status { verbose } => commands::status::run(&cli.dir, verbose),
        Commands::Purge { force } => commands::purge::run(&cli.dir, force),
        Commands::Watch { interval } => commands::watch::run(&cli.dir, interval).await,
    }
}

/// Diagnostics go to stderr via RUST_LOG; user-facing output stays on stdout.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("calmirror=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
