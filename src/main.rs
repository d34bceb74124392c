use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::util::SubscriberInitExt;

use lingorag::config::{Config, DEFAULT_CONFIG_PATH};
use lingorag::embedder::download;
use lingorag::engine::{Engine, EngineCell};
use lingorag::language::Language;
use lingorag::logging;
use lingorag::mcp::server::{McpContext, McpServer};

static ENGINE: EngineCell = EngineCell::new();

#[derive(Parser)]
#[command(name = "lingorag", version)]
#[command(about = "Multilingual retrieval QA over a local corpus of teachings")]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the vector index from the data folder
    Ingest {
        /// Delete and rebuild an existing index
        #[arg(long)]
        rebuild: bool,

        /// Source directory (defaults to data_folder from the config)
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Answer a question from the indexed passages
    Ask {
        question: String,

        /// Answer language code (en, hi, te, kn); detected when omitted
        #[arg(long)]
        lang: Option<Language>,
    },

    /// Show the top-k passages for a query
    Search {
        query: String,

        /// Number of passages (defaults to top_k from the config)
        #[arg(short)]
        k: Option<usize>,
    },

    /// Report index and model status
    Health,

    /// Fetch the embedding model files
    DownloadModel,

    /// Run the MCP server on stdio
    Serve,
}

/// Constructs the process engine once, off the async runtime.
async fn engine(config: Config) -> Result<Arc<Engine>> {
    tokio::task::spawn_blocking(move || ENGINE.get_or_try_init(|| Engine::from_config(config)))
        .await
        .context("engine initialization panicked")?
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries MCP traffic in `serve`, so logs go to stderr.
    let (subscriber, log_filter) = logging::subscriber(logging::startup_filter(), std::io::stderr);
    subscriber.init();

    let mut config = Config::load(&args.config)?;
    config.apply_env_overrides();

    if std::env::var_os("RUST_LOG").is_none() {
        logging::set_level(&log_filter, &config.log_level)?;
    }
    config.validate().context("invalid configuration")?;

    match args.command {
        Command::Ingest { rebuild, data } => {
            let engine = engine(config).await?;
            let report = tokio::task::spawn_blocking(move || {
                engine.build_index(data.as_deref(), rebuild)
            })
            .await
            .context("ingestion panicked")??;
            if report.skipped {
                info!("Index exists; pass --rebuild to recreate it");
            }
            print_json(&report)?;
        }
        Command::Ask { question, lang } => {
            let engine = engine(config).await?;
            print_json(&engine.ask(&question, lang))?;
        }
        Command::Search { query, k } => {
            let k = k.unwrap_or(config.top_k);
            let engine = engine(config).await?;
            print_json(&engine.search(&query, k))?;
        }
        Command::Health => {
            let engine = engine(config).await?;
            print_json(&engine.health())?;
        }
        Command::DownloadModel => {
            let dir = config.model_dir();
            let name = config.model.name.clone();
            tokio::task::spawn_blocking(move || download::download_model_files(&dir, &name))
                .await
                .context("download panicked")??;
        }
        Command::Serve => {
            info!("Starting lingorag MCP server...");
            let config = Arc::new(config);
            let engine = engine((*config).clone()).await?;
            let ctx = McpContext {
                engine: Arc::new(RwLock::new(engine)),
                config,
            };
            McpServer::new(ctx).start().await?;
        }
    }

    Ok(())
}
