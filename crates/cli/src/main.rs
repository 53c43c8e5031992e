//! Celsia CLI: the main entry point.
//!
//! Commands:
//! - `chat`    : interactive or single-message chat
//! - `serve`   : start the HTTP API
//! - `ingest`  : load corpus JSON files into the knowledge collection
//! - `doctor`  : check configuration, engines and the collection
//! - `config`  : show, initialise or locate the config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "celsia",
    about = "Celsia: customer-support assistant with retrieval and business tools",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file to use instead of ~/.celsia/config.toml
    #[arg(long, global = true, env = "CELSIA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session id (a fresh one is generated when omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load corpus JSON files (or directories of them) into the knowledge collection
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Empty the collection before loading
        #[arg(long)]
        clear: bool,
    },

    /// Diagnose configuration and engine connectivity
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (api keys masked)
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Chat { message, session } => commands::chat::run(config_path, message, session).await?,
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ingest { paths, clear } => commands::ingest::run(config_path, &paths, clear).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Init { force } => commands::config_cmd::init(config_path, force).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
        },
    }

    Ok(())
}
