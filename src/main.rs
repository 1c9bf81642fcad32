//! treesync - cron-scheduled directory mirroring.
//!
//! Main entry point for the treesync CLI and server.

mod cli;
mod cmd_jobs;
mod server;

use clap::Parser;

use treesync_config::ConfigLoader;

use cli::{Cli, Commands};
use server::{init_tracing, run_server, validate_config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load_or_default(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = ConfigLoader::expand_path(&data_dir.to_string_lossy()).into();
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_tracing(&config.storage.data_dir)?;

    match cli.command {
        None | Some(Commands::Serve) => {
            validate_config(&config)?;
            run_server(config).await
        }
        Some(Commands::List { format }) => cmd_jobs::list_jobs(&config, &format).await,
        Some(Commands::Run { id }) => {
            validate_config(&config)?;
            cmd_jobs::run_job(&config, &id).await
        }
    }
}
