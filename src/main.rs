//! # docchat CLI
//!
//! Ask questions about PDF documents from the terminal, or serve the same
//! pipeline over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat chat <paths…>` | Ingest PDFs, then chat interactively |
//! | `docchat ask <paths…> -q "…"` | Ingest PDFs, then answer one or more questions |
//! | `docchat chunks <paths…>` | Show how PDFs are extracted and chunked |
//! | `docchat serve` | Start the HTTP API |
//! | `docchat completions <shell>` | Print a shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! # Chat about every PDF in a folder
//! docchat chat ./handbooks
//!
//! # Multi-turn, non-interactive
//! docchat ask syllabus.pdf -q "When is the midterm?" -q "And the final?"
//!
//! # Inspect chunking without calling any provider
//! docchat chunks syllabus.pdf --json
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use docchat::progress::ProgressMode;
use docchat::{chat, config, logging, server};

/// docchat: chat with your PDF documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docchat.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat: chat with your PDF documents",
    version,
    long_about = "docchat extracts the text of PDF documents, splits it into overlapping chunks, \
    embeds them into an in-memory index, and answers questions with a chat model grounded on the \
    most relevant passages, keeping the conversation so follow-up questions work."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docchat.toml`. A missing file means all defaults.
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    /// More log output on stderr (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Ingestion progress on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest PDFs, then answer questions typed on stdin.
    ///
    /// Type `/history` to see the conversation and `/quit` (or EOF) to leave.
    Chat {
        /// PDF files or directories (searched recursively for *.pdf).
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Ingest PDFs, then answer the given questions in order.
    ///
    /// Questions share one conversation, so later ones can refer back.
    Ask {
        /// PDF files or directories (searched recursively for *.pdf).
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Question to ask. Repeat for a multi-turn exchange.
        #[arg(short = 'q', long = "question", required = true)]
        questions: Vec<String>,
    },

    /// Extract and chunk PDFs without embedding or generation.
    Chunks {
        /// PDF files or directories (searched recursively for *.pdf).
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print one JSON object per chunk instead of previews.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP API.
    Serve {
        /// Address to bind, overriding `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print a shell completion script to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    logging::init_logging(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "docchat", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Chat { paths } => {
            chat::run_chat(&cfg, &paths, progress).await?;
        }
        Commands::Ask { paths, questions } => {
            chat::run_ask(&cfg, &paths, &questions, progress).await?;
        }
        Commands::Chunks { paths, json } => {
            chat::run_chunks(&cfg, &paths, json, progress).await?;
        }
        Commands::Serve { bind } => {
            server::run_server(&cfg, bind).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
