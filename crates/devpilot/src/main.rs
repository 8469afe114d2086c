//! DevPilot - repository snapshot and patch application engine.
//!
//! This is the main entry point for the devpilot CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::*;
use devpilot_core::{ApplyOptions, RepoSession, SettingsStore};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devpilot")]
#[command(author, version, about = "Repository snapshot and patch application engine", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings directory (defaults to `$DEVPILOT_CONFIG_DIR` or the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1:8765")]
        address: SocketAddr,
    },
    /// Scan a repository and report its file count
    Scan {
        /// Repository root
        root: String,
    },
    /// Classify proposed edits without writing anything
    Plan {
        /// Repository root
        #[arg(short, long)]
        root: String,
        /// JSON file with the proposed edits
        #[arg(short, long)]
        edits: PathBuf,
    },
    /// Apply proposed edits, backing up files before their first overwrite
    Apply {
        /// Repository root
        #[arg(short, long)]
        root: String,
        /// JSON file with the proposed edits
        #[arg(short, long)]
        edits: PathBuf,
        /// Report what would be written without writing
        #[arg(long)]
        dry_run: bool,
        /// Write even when a baseline does not match disk
        #[arg(long)]
        force: bool,
    },
    /// Restore files from their backups
    Revert {
        /// Repository root
        #[arg(short, long)]
        root: String,
        /// Relative paths to restore
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let serving = matches!(cli.command, Commands::Serve { .. });
    let log_file = init_logging(cli.verbose, serving);
    if let Some(path) = &log_file {
        tracing::debug!(path = %path.display(), "Logging to file");
    }

    let store = match cli.config_dir {
        Some(dir) => SettingsStore::new(dir),
        None => SettingsStore::default_location()?,
    };
    let session = RepoSession::open(store).await;

    match cli.command {
        Commands::Serve { address } => run_server(address, session).await,
        Commands::Scan { root } => handle_scan(&session, &root).await,
        Commands::Plan { root, edits } => handle_plan(&session, &root, &edits).await,
        Commands::Apply {
            root,
            edits,
            dry_run,
            force,
        } => handle_apply(&session, &root, &edits, ApplyOptions { dry_run, force }).await,
        Commands::Revert { root, paths } => handle_revert(&session, &root, &paths).await,
    }
}
