//! # Content Insight server (`insight`)
//!
//! ## Usage
//!
//! ```bash
//! insight --config ./config/insight.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `insight init` | Create the key-value schema in the SQLite file |
//! | `insight serve` | Start the HTTP server |
//! | `insight purge` | Delete expired records |
//!
//! The completion-API key is read from the environment variable named by
//! `[gateway].api_key_env` (default `GROQ_API_KEY`); a `.env` file in the
//! working directory is loaded first.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use content_insight::store::{KvStore, SqliteKvStore};
use content_insight::{config, migrate, server};

/// Content Insight: ingest content, generate LLM study analyses, archive
/// the results.
#[derive(Parser)]
#[command(name = "insight", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/insight.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store schema. Safe to run repeatedly.
    Init,

    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and runs until Ctrl-C.
    Serve,

    /// Delete records whose TTL has passed.
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to load .env");
        }
    }

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Store initialized at {}", cfg.store.path.display());
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Purge => {
            let store = SqliteKvStore::open(&cfg).await?;
            let purged = store.purge_expired().await?;
            store.close().await;
            println!("Purged {} expired records.", purged);
        }
    }

    Ok(())
}
