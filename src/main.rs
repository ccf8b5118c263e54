mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use memorylink::config::MemoryLinkConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "memorylink", version, about = "Encrypted local memory store with semantic search")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Search stored memories by meaning
    Search {
        query: String,
        /// Maximum number of results (1-100)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Minimum similarity (0.0-1.0)
        #[arg(short, long)]
        threshold: Option<f64>,
    },
    /// Show store statistics
    Stats,
    /// Check the database, model files and configuration
    Doctor,
    /// Print a new random encryption secret
    Keygen,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.memorylink/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MemoryLinkConfig::load()?;

    // stdout is reserved for MCP JSON-RPC
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve_stdio(config).await?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
        Command::Search {
            query,
            limit,
            threshold,
        } => cli::search::search(&config, &query, limit, threshold).await?,
        Command::Stats => cli::stats::stats(&config).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Keygen => cli::keygen(),
    }

    Ok(())
}
