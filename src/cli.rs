//! CLI definitions for treesync.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// treesync CLI.
#[derive(Parser)]
#[command(name = "treesync")]
#[command(about = "Cron-scheduled directory mirroring with change detection")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "treesync.toml", global = true)]
    pub config: PathBuf,

    /// Data directory holding the job table and run logs
    #[arg(short, long, env = "TREESYNC_DATA", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Server host
    #[arg(long, env = "HOST", global = true)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, env = "PORT", global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler and HTTP API in foreground (default)
    Serve,

    /// List the persisted jobs
    List {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Run one job once and print its outcome
    Run {
        /// Job ID
        id: String,
    },
}
