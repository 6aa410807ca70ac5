//! EduSync CLI
//!
//! Keeps local CSV files and a SQLite database synchronized.
//!
//! # Commands
//!
//! - `run` - Synchronize on the configured interval until interrupted
//! - `once` - Run a single sync cycle and print its report
//! - `recover` - Restore files left mid-transaction by a crash

mod commands;
mod config;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// EduSync offline-first synchronization.
#[derive(Parser)]
#[command(name = "edusync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(global = true, short, long, default_value = "edusync.json")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize on the configured interval until interrupted
    Run,

    /// Run a single sync cycle
    Once {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Restore files left mid-transaction by a crash
    Recover,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run => commands::run::run(&cli.config)?,
        Commands::Once { format } => commands::once::run(&cli.config, &format)?,
        Commands::Recover => commands::recover::run(&cli.config)?,
        Commands::Version => {
            println!("EduSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("EduSync Sync Engine v{}", edusync_sync_engine::VERSION);
        }
    }

    Ok(())
}
