//! proctor CLI — run timed assessment attempts from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

const DEFAULT_LOG_FILTER: &str = "proctor=info,proctor_core=info,proctor_client=info";

#[derive(Parser)]
#[command(name = "proctor", version, about = "Timed assessment attempts with server-synced countdown")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an attempt and count down until time is up
    Run {
        /// Assessment identifier
        #[arg(long)]
        assessment: String,

        /// Countdown length in seconds (defaults to the config value)
        #[arg(long)]
        duration: Option<u64>,

        /// Override the API base URL
        #[arg(long)]
        api_url: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Ask the server how much time is left
    Remaining {
        /// Assessment identifiers (comma-separated)
        #[arg(long)]
        assessment: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Override the API base URL
        #[arg(long)]
        api_url: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config file
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            assessment,
            duration,
            api_url,
            config,
        } => commands::run::execute(assessment, duration, api_url, config).await,
        Commands::Remaining {
            assessment,
            format,
            api_url,
            config,
        } => commands::remaining::execute(assessment, format, api_url, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
