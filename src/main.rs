//! # QA Sync CLI (`qasync`)
//!
//! ```bash
//! qasync --config ./config/qasync.toml sync
//! qasync sync --collection QAEntry --dry-run
//! qasync sync --json
//! qasync collections
//! ```
//!
//! Logs go to stderr (`RUST_LOG` overrides the level); summaries and JSON
//! reports go to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use qa_sync::{config, sync};

/// Sync Markdown Q&A and tooltip entries into Weaviate.
#[derive(Parser)]
#[command(name = "qasync", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/qasync.toml")]
    config: PathBuf,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile collections with their Markdown sources.
    ///
    /// Inserts new entries, rewrites existing ones, and deletes entries
    /// that no longer appear in the sources.
    Sync {
        /// Only sync this collection.
        #[arg(long)]
        collection: Option<String>,

        /// Show what would change without writing.
        #[arg(long)]
        dry_run: bool,

        /// Print reports as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List configured collections.
    Collections,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync {
            collection,
            dry_run,
            json,
        } => {
            sync::run_sync(&cfg, collection.as_deref(), dry_run, json).await?;
        }
        Commands::Collections => {
            sync::list_collections(&cfg);
        }
    }

    Ok(())
}
