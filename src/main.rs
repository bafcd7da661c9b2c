mod auth;
mod config;
mod lyrics;
mod storage;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "lyricache", version, about = "Cached lyrics lookup for catalog tracks")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve lyrics for one track (cache, then Genius, then lyrics.ovh).
    Resolve {
        track_key: String,
        /// Song name; required together with --artist to query providers.
        #[arg(long)]
        song: Option<String>,
        #[arg(long)]
        artist: Option<String>,
    },
    /// Resolve a JSON array of {trackKey, songName, artist} read from FILE or stdin.
    Batch { file: Option<PathBuf> },
    /// Search cached lyrics by song, artist or text.
    Search { query: String },
    /// Remove a track's cached lyrics.
    Delete { track_key: String },
    /// Check the Genius API with a trivial search.
    Health,
    /// Print the config file path in use.
    ConfigPath,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg_path = match cli.config.clone() {
        Some(p) => p,
        None => config::default_config_path().context("default config path")?,
    };

    match cli.command {
        Command::ConfigPath => {
            println!("{}", cfg_path.display());
        }
        Command::Resolve {
            track_key,
            song,
            artist,
        } => {
            let service = open_service(&cfg_path)?;
            let result = service
                .resolve(&track_key, song.as_deref(), artist.as_deref())
                .await?;
            print_json(&result)?;
        }
        Command::Batch { file } => {
            let service = open_service(&cfg_path)?;
            let raw = read_batch_input(file.as_deref()).await?;
            let items: Vec<lyrics::BatchItem> =
                serde_json::from_str(&raw).context("parse batch json")?;
            tracing::info!(items = items.len(), "starting batch");
            let results = service.batch_resolve(&items).await;
            print_json(&results)?;
        }
        Command::Search { query } => {
            let service = open_service(&cfg_path)?;
            print_json(&service.search_cache(&query).await?)?;
        }
        Command::Delete { track_key } => {
            let service = open_service(&cfg_path)?;
            print_json(&service.delete_cached(&track_key).await?)?;
        }
        Command::Health => {
            let service = open_service(&cfg_path)?;
            print_json(&service.provider_health().await)?;
        }
    }

    Ok(())
}

fn open_service(cfg_path: &std::path::Path) -> anyhow::Result<lyrics::LyricsService> {
    let cfg = config::load(Some(cfg_path)).context("load config")?;
    lyrics::service_from_config(&cfg).context("init lyrics service")
}

async fn read_batch_input(file: Option<&std::path::Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read {}", path.display())),
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("read stdin")?;
            Ok(raw)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
