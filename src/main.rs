//! codegraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(about = "Source-code knowledge graph indexer and query service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Repository root path (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the repository once and exit
    Index,
    /// Start the query/ingestion HTTP server, with a file watcher attached
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7890")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Open the server's health endpoint in a browser once it's up
        #[arg(short, long)]
        open: bool,

        /// Disable the background file watcher
        #[arg(long)]
        no_watch: bool,
    },
    /// Watch the repository for changes, re-indexing incrementally, without serving HTTP
    Watch,
    /// Clear the on-disk cache
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("codegraph={log_level}")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("codegraph v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("repository root: {}", cli.root.display());

    match cli.command {
        Commands::Index => commands::index(cli.root).await,
        Commands::Serve { port, host, open, no_watch } => {
            commands::serve(cli.root, host, port, open, no_watch).await
        }
        Commands::Watch => commands::watch(cli.root).await,
        Commands::Clear => commands::clear(cli.root),
        Commands::Version => {
            println!("codegraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
