//! Lyrics resolution for catalog tracks
//!
//! This module provides:
//! - Genius search client with match scoring and page scraping
//! - lyrics.ovh exact-lookup client used as a fallback
//! - The resolution service tying both to the persistent cache

pub mod error;
pub mod extract;
pub mod genius;
pub mod matching;
pub mod models;
pub mod ovh;
pub mod provider;
pub mod service;

pub use genius::GeniusClient;
pub use models::BatchItem;
pub use ovh::LyricsOvhClient;
pub use service::{LyricsService, ServiceOptions};

use crate::config::Config;
use crate::storage::SqliteLyricsCache;
use std::sync::Arc;

/// Wires the service from config: SQLite cache, Genius, lyrics.ovh.
pub fn service_from_config(cfg: &Config) -> anyhow::Result<LyricsService> {
    let cache = SqliteLyricsCache::new(cfg.db_path())?;
    let credentials = crate::auth::from_config(&cfg.genius)?;
    if credentials.is_none() {
        tracing::warn!("no Genius credentials configured, only lyrics.ovh will be queried");
    }

    let genius = GeniusClient::new(&cfg.genius.base_url, credentials, cfg.genius.timeout())?;
    let ovh = LyricsOvhClient::new(&cfg.fallback.base_url, cfg.fallback.timeout())?;

    Ok(LyricsService::new(
        Arc::new(cache),
        Arc::new(genius),
        Arc::new(ovh),
        extract::Extractor::genius(),
        ServiceOptions {
            weights: cfg.matching.clone(),
            min_chars: cfg.extraction.min_chars,
            batch_delay: cfg.batch.delay(),
        },
    ))
}
