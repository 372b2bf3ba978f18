#![cfg_attr(not(test), forbid(unsafe_code))]

//! Main entry point for the Driftchat terminal client.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::{error::Error, path::PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;

/// Driftchat CLI
#[derive(Parser)]
#[command(name = "driftchat")]
#[command(about = "Terminal client for the Driftchat platform", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the Driftchat CLI
#[derive(Subcommand)]
enum Commands {
    /// Join the room and chat interactively
    Chat {
        /// Path to the configuration file (YAML or JSON)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Display name for this session, overriding the stored profile
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Print recent messages from the durable history
    History {
        /// Path to the configuration file (YAML or JSON)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Maximum number of messages to fetch
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(long, short)]
        shell: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { config, name } => {
            commands::chat::start_chat(config, name).await?;
        }
        Commands::History { config, limit } => {
            commands::history::show_history(config, limit).await?;
        }
        Commands::Completion { shell } => {
            let shell = shell
                .parse::<clap_complete::Shell>()
                .expect("Invalid shell type provided");
            commands::completion::generate_completion(shell);
        }
    }

    Ok(())
}
