//! # repo-rag CLI
//!
//! ## Usage
//!
//! ```bash
//! repo-rag [--config ./config/repo-rag.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repo-rag init` | Create the index database and collection |
//! | `repo-rag index <PATHS>...` | Chunk, embed, and store files |
//! | `repo-rag query "<text>"` | Show the closest chunks |
//! | `repo-rag ask "<question>" --file <PATH>...` | Index files, then answer from them |
//! | `repo-rag briefs <PATHS>...` | Summarize each file |
//! | `repo-rag stats` | Show collection statistics |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use repo_rag::{commands, config, logging, stats};

/// repo-rag: answer questions about source files with retrieval-augmented
/// generation.
#[derive(Parser)]
#[command(
    name = "repo-rag",
    about = "Index source files into a local vector store and answer questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults are used when
    /// omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the index database and collection. Idempotent.
    Init,

    /// Chunk, embed, and store files in the vector index.
    ///
    /// Unsupported extensions are skipped; missing or unreadable files are
    /// reported and the rest are still indexed.
    Index {
        /// Files to index.
        #[arg(required = true)]
        paths: Vec<String>,

        /// Print index stats as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Retrieve the chunks most similar to a query.
    Query {
        text: String,

        /// Number of chunks to return (defaults to `[retrieval] top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Index the given files, then answer a question grounded in them.
    Ask {
        question: String,

        /// File to index before answering. Repeatable; at least one.
        #[arg(long = "file", required = true)]
        files: Vec<String>,

        #[arg(long)]
        top_k: Option<usize>,

        /// Print `{answer, sources, chunks, index_stats}` as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate a short description of each file.
    Briefs {
        #[arg(required = true)]
        paths: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show collection statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_or_default(cli.config.as_deref())?;
    logging::init_logging(&cfg.logging);

    match cli.command {
        Commands::Init => {
            commands::run_init(&cfg).await?;
        }
        Commands::Index { paths, json } => {
            commands::run_index(&cfg, &paths, json).await?;
        }
        Commands::Query { text, top_k, json } => {
            commands::run_query(&cfg, &text, top_k, json).await?;
        }
        Commands::Ask {
            question,
            files,
            top_k,
            json,
        } => {
            commands::run_ask(&cfg, &question, files, top_k, json).await?;
        }
        Commands::Briefs { paths, json } => {
            commands::run_briefs(&cfg, &paths, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
