//! # Intellidoc CLI (`intellidoc`)
//!
//! Ingest PDFs, ask questions about them, and run the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! intellidoc --config ./config/intellidoc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `intellidoc init` | Create storage directories and the index schema |
//! | `intellidoc ingest <file.pdf>` | Extract, chunk, embed and index a PDF |
//! | `intellidoc ask "<question>"` | Answer a question from the indexed PDFs |
//! | `intellidoc stats` | Show document and chunk counts |
//! | `intellidoc serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! intellidoc init
//! intellidoc ingest ./reports/q3.pdf
//! intellidoc ask "What was the Q3 revenue?"
//! intellidoc ask "And Q4?" --history ./history.json
//! RUST_LOG=intellidoc=debug intellidoc serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use intellidoc::{commands, config, server, stats};

/// Intellidoc: question answering over your PDFs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/intellidoc.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "intellidoc",
    about = "Intellidoc: retrieval-augmented question answering over PDF documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/intellidoc.toml`. Built-in defaults are used
    /// when the file does not exist.
    #[arg(long, global = true, default_value = "./config/intellidoc.toml")]
    config: PathBuf,

    /// Env file to load (e.g. for `OPENAI_API_KEY`). Ignored if missing.
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize storage directories and the index schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Ingest a PDF into the index.
    ///
    /// Re-ingesting the same file adds its chunks again.
    Ingest {
        /// Path to a `.pdf` file.
        file: PathBuf,
    },

    /// Ask a question about the ingested documents.
    Ask {
        /// The question.
        question: String,

        /// JSON file with prior turns: `[{"role": "user"|"assistant", "content": "..."}]`.
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Show index statistics.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if config::load_env_file(&cli.env_file)? {
        tracing::debug!(path = %cli.env_file.display(), "loaded env file");
    }

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            commands::run_init(&cfg).await?;
        }
        Commands::Ingest { file } => {
            commands::run_ingest(&cfg, &file).await?;
        }
        Commands::Ask { question, history } => {
            commands::run_ask(&cfg, &question, history.as_deref()).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
