//! Conference Concierge CLI
//!
//! Main entry point for the concierge command-line tool: ask questions about
//! a conference and get answers grounded in its indexed documents.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, StatusCommand};
use concierge_core::{config::AppConfig, logging, AppResult};

/// Conference Concierge - RAG-backed answers about conference sessions
#[derive(Parser, Debug)]
#[command(name = "concierge")]
#[command(about = "Ask questions about the conference", long_about = None)]
#[command(version)]
struct Cli {
    /// Llama Stack server URL
    #[arg(short, long, global = true, env = "LLAMA_STACK_URL")]
    url: Option<String>,

    /// Model identifier (default: first LLM the server lists)
    #[arg(short, long, global = true, env = "CONCIERGE_MODEL")]
    model: Option<String>,

    /// Vector database identifier (default: first registered)
    #[arg(long, global = true, env = "CONCIERGE_VECTOR_DB")]
    vector_db: Option<String>,

    /// Seconds to wait for one complete answer
    #[arg(long, global = true)]
    turn_timeout: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive chat
    Chat(ChatCommand),

    /// Ask a single question
    Ask(AskCommand),

    /// Check the connection to the server
    Status(StatusCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load()?.with_overrides(
        cli.url,
        cli.model,
        cli.vector_db,
        cli.turn_timeout,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Conference Concierge starting");
    tracing::debug!("Server: {}", config.base_url);
    tracing::debug!("Model: {:?}", config.model);
    tracing::debug!("Vector DB: {:?}", config.vector_db);

    let command_name = match &cli.command {
        Commands::Chat(_) => "chat",
        Commands::Ask(_) => "ask",
        Commands::Status(_) => "status",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Status(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
