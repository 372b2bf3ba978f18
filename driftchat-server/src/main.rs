#![cfg_attr(not(test), forbid(unsafe_code))]

//! Main entry point for the Driftchat relay server.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::server::ServerConfig;
use std::error::Error;
use std::path::PathBuf;

/// Main CLI structure for the Driftchat server
#[derive(Parser)]
#[command(name = "driftchat-server")]
#[command(about = "Relay server for the Driftchat platform", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for the Driftchat server CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server
    Serve {
        /// Port to bind, overriding configuration (e.g. `--port 8080`)
        #[arg(long, short)]
        port: Option<u16>,

        /// Path to the configuration file (YAML or JSON)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

/// Initializes environment variables and returns the parsed CLI.
#[must_use]
pub fn initialize_cli() -> Cli {
    dotenv().ok();
    Cli::parse()
}

/// Handles the serve command by loading configuration and starting the server.
///
/// # Errors
/// Returns an error if configuration loading or server startup fails.
pub async fn handle_serve_command(
    port: Option<u16>,
    config: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let resolved_config = ServerConfig::load_config(config, port)?;
    server::server::run(resolved_config).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = initialize_cli();

    match cli.command {
        Commands::Serve { port, config } => handle_serve_command(port, config).await,
    }
}
