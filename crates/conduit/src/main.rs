//! conduit - chat with a completion endpoint that can call MCP tools

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{chat_command, init_command, status_command, tools_command};

/// conduit - tool-using chat agent for your terminal
#[derive(Parser)]
#[command(name = "conduit")]
#[command(about = "◆ Chat agent bridging a completion endpoint and an MCP tool server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Config file (defaults to ~/.conduit/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    Chat {
        /// Send one message and print the answer instead of starting a session
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List the tools the tool service exposes
    Tools,
    /// Write a default config file
    Init,
    /// Show configuration state
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Chat { message } => chat_command(config, message).await,
        Commands::Tools => tools_command(config).await,
        Commands::Init => init_command(config).await,
        Commands::Status => status_command(config).await,
    };

    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
