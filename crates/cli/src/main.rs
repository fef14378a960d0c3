//! Causerie CLI — the main entry point.
//!
//! Commands:
//! - `chat`   — interactive conversation (streaming)
//! - `ask`    — one question, one answer
//! - `config` — show the resolved configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "causerie",
    about = "Causerie — assistant conversationnel local",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a config file (default: ~/.causerie/config.toml)
    #[arg(short, long, global = true, env = "CAUSERIE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive conversation
    Chat {
        /// Do not restore or persist the conversation history
        #[arg(long)]
        ephemeral: bool,
    },

    /// Ask a single question and print the answer
    Ask {
        /// The question
        question: String,

        /// Print the complete answer at once instead of streaming
        #[arg(long)]
        no_stream: bool,
    },

    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => causerie_config::AppConfig::load_from(path)?,
        None => causerie_config::AppConfig::load()?,
    };
    config.validate()?;

    match cli.command {
        Commands::Chat { ephemeral } => commands::chat::run(config, ephemeral).await?,
        Commands::Ask {
            question,
            no_stream,
        } => commands::ask::run(config, &question, no_stream).await?,
        Commands::Config => commands::config_cmd::run(config),
    }

    Ok(())
}
