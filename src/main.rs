//! NEXUS Context - fit a codebase into an LLM context window
//!
//! Indexes source files into semantic nodes, ranks them against a request
//! and compresses the result into the model's token budget.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use nexus_context::config;

mod cli;

/// NEXUS Context - codebase context optimizer
#[derive(Parser)]
#[command(name = "nexus-ctx")]
#[command(author = "Mustafa Saraç <mustafa@mustafasarac.com>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Index, rank and compress a codebase into an LLM token budget", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "NEXUS_CONTEXT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory and print a summary
    Index {
        /// Path to index (defaults to current directory)
        path: Option<PathBuf>,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rank code nodes against a query
    Search {
        /// Search query
        query: String,

        /// Directory to search (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Maximum results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build the optimized context for a request
    Optimize {
        /// The user request
        query: String,

        /// Project directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Target model id, used to size the context window
        #[arg(short, long, default_value = "gpt-4o")]
        model: String,

        /// System prompt counted against the budget
        #[arg(short, long)]
        system: Option<String>,

        /// Token budget for the context (defaults to a share of the corpus)
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Run retrieval even when the request already fits
        #[arg(short, long)]
        force: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays pipeable
    let level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = config::load_config(cli.config.as_deref())?;
    config.verbose = cli.verbose;

    debug!("NEXUS Context v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Index { path, json } => {
            cli::index::run(config, path.as_deref(), json).await?;
        }
        Commands::Search {
            query,
            path,
            limit,
            json,
        } => {
            cli::search::run(config, &query, limit, path.as_deref(), json).await?;
        }
        Commands::Optimize {
            query,
            path,
            model,
            system,
            max_tokens,
            force,
            json,
        } => {
            let args = cli::optimize::OptimizeArgs {
                query,
                path,
                model,
                system,
                max_tokens,
                force,
                json,
            };
            cli::optimize::run(config, args).await?;
        }
        Commands::Config { show, init } => {
            if init {
                let (path, created) = config::init_config(cli.config.as_deref())?;
                if created {
                    println!("Configuration initialized at {:?}", path);
                } else {
                    println!("Configuration file already exists at {:?}", path);
                }
            } else if show {
                println!("{}", config::show_config(&config)?);
            } else {
                println!("{:?}", config::config_path()?);
            }
        }
    }

    Ok(())
}
