//! Lyrics resolution: cache first, then the primary provider, then the
//! fallback provider. Successful provider results are written back to the
//! cache.

use crate::lyrics::error::LyricsError;
use crate::lyrics::extract::{clean_lyrics_text, Extractor};
use crate::lyrics::matching::{self, MatchWeights};
use crate::lyrics::models::{
    clean_hint, BatchItem, DeleteResponse, LyricsResult, ProviderHealth, SearchHit,
    SearchResponse, SourceTag, TrackKey,
};
use crate::lyrics::provider::{FallbackProvider, PrimaryProvider};
use crate::storage::{CachedLyrics, LyricsCache};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

const SEARCH_LIMIT: usize = 20;
const PREVIEW_CHARS: usize = 100;

const MSG_MISSING_HINTS: &str = "song name and artist are required to query lyrics providers";
const MSG_NOT_FOUND: &str = "lyrics not found from any source";

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub weights: MatchWeights,
    /// Minimum length of cleaned scraped text.
    pub min_chars: usize,
    pub batch_delay: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            weights: MatchWeights::default(),
            min_chars: 50,
            batch_delay: Duration::from_millis(200),
        }
    }
}

struct Resolved {
    song_name: Option<String>,
    artist_name: Option<String>,
    lyrics: String,
    source: SourceTag,
}

struct Outcome {
    result: LyricsResult,
    contacted_provider: bool,
}

pub struct LyricsService {
    cache: Arc<dyn LyricsCache>,
    primary: Arc<dyn PrimaryProvider>,
    fallback: Arc<dyn FallbackProvider>,
    extractor: Extractor,
    options: ServiceOptions,
}

impl LyricsService {
    pub fn new(
        cache: Arc<dyn LyricsCache>,
        primary: Arc<dyn PrimaryProvider>,
        fallback: Arc<dyn FallbackProvider>,
        extractor: Extractor,
        options: ServiceOptions,
    ) -> Self {
        Self {
            cache,
            primary,
            fallback,
            extractor,
            options,
        }
    }

    /// Resolves lyrics for a track.
    ///
    /// "Not found" is a normal `success: false` result. Only an invalid key
    /// or a failing cache read is returned as an error.
    pub async fn resolve(
        &self,
        track_key: &str,
        song_name: Option<&str>,
        artist_name: Option<&str>,
    ) -> anyhow::Result<LyricsResult> {
        Ok(self.resolve_inner(track_key, song_name, artist_name).await?.result)
    }

    async fn resolve_inner(
        &self,
        track_key: &str,
        song_name: Option<&str>,
        artist_name: Option<&str>,
    ) -> anyhow::Result<Outcome> {
        let key = TrackKey::parse(track_key)?;

        if let Some(entry) = self
            .cache
            .find_by_key(key.as_str())
            .await
            .with_context(|| format!("read lyrics cache for {key}"))?
        {
            tracing::debug!(track_key = %key, "lyrics cache hit");
            return Ok(Outcome {
                result: LyricsResult::found(
                    key.as_str(),
                    SourceTag::Cache,
                    entry.song_name,
                    entry.artist_name,
                    entry.lyrics_text,
                ),
                contacted_provider: false,
            });
        }

        let (Some(song), Some(artist)) = (clean_hint(song_name), clean_hint(artist_name)) else {
            tracing::debug!(track_key = %key, "cache miss without hints");
            return Ok(Outcome {
                result: LyricsResult::failed(key.as_str(), MSG_MISSING_HINTS),
                contacted_provider: false,
            });
        };

        let resolved = match self.from_primary(&song, &artist).await {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                log_step_failure(&key, self.primary.name(), &e);
                match self.from_fallback(&song, &artist).await {
                    Ok(resolved) => Some(resolved),
                    Err(e) => {
                        log_step_failure(&key, self.fallback.name(), &e);
                        None
                    }
                }
            }
        };

        let result = match resolved {
            Some(resolved) => {
                tracing::info!(track_key = %key, source = resolved.source.as_str(), "lyrics resolved");
                self.write_back(&key, &resolved).await;
                LyricsResult::found(
                    key.as_str(),
                    resolved.source,
                    resolved.song_name,
                    resolved.artist_name,
                    resolved.lyrics,
                )
            }
            None => LyricsResult::failed(key.as_str(), MSG_NOT_FOUND),
        };

        Ok(Outcome {
            result,
            contacted_provider: true,
        })
    }

    async fn from_primary(&self, song: &str, artist: &str) -> Result<Resolved, LyricsError> {
        let provider = self.primary.name();
        let candidates = self.primary.search(&format!("{song} {artist}")).await?;
        let (best, score) = matching::best_match(&candidates, song, artist, &self.options.weights)
            .ok_or(LyricsError::NotFound)?;
        tracing::debug!(provider, id = best.id, title = %best.title, score, "picked search hit");

        let html = self.primary.fetch_page_html(&best.url).await?;
        let (strategy, raw) = self
            .extractor
            .extract(&html)
            .ok_or_else(|| LyricsError::extraction(provider, "no lyrics container on page"))?;

        let text = clean_lyrics_text(&raw);
        let len = text.chars().count();
        if len < self.options.min_chars {
            return Err(LyricsError::extraction(
                provider,
                format!("cleaned text too short ({len} chars via {strategy})"),
            ));
        }

        Ok(Resolved {
            song_name: Some(non_empty_or(&best.title, song)),
            artist_name: Some(non_empty_or(&best.primary_artist_name, artist)),
            lyrics: text,
            source: SourceTag::ProviderPrimary,
        })
    }

    async fn from_fallback(&self, song: &str, artist: &str) -> Result<Resolved, LyricsError> {
        let found = self
            .fallback
            .fetch_by_artist_and_title(artist, song)
            .await?
            .ok_or(LyricsError::NotFound)?;

        Ok(Resolved {
            song_name: Some(song.to_string()),
            artist_name: Some(artist.to_string()),
            lyrics: found.lyrics_text,
            source: SourceTag::ProviderFallback,
        })
    }

    async fn write_back(&self, key: &TrackKey, resolved: &Resolved) {
        let entry = CachedLyrics {
            track_key: key.as_str().to_string(),
            song_name: resolved.song_name.clone(),
            artist_name: resolved.artist_name.clone(),
            lyrics_text: resolved.lyrics.clone(),
            source_tag: resolved.source,
            updated_at: OffsetDateTime::now_utc(),
        };
        if let Err(e) = self.cache.upsert(entry).await {
            let err = LyricsError::CacheWriteFailed(format!("{e:#}"));
            tracing::warn!(track_key = %key, error = %err, "keeping resolved lyrics uncached");
        }
    }

    /// Resolves each item in order, one at a time.
    ///
    /// Items that reached a provider are followed by the configured delay.
    /// A failing item never aborts the batch.
    pub async fn batch_resolve(&self, items: &[BatchItem]) -> Vec<LyricsResult> {
        let mut results = Vec::with_capacity(items.len());
        let mut throttle = false;

        for item in items {
            if throttle && !self.options.batch_delay.is_zero() {
                tokio::time::sleep(self.options.batch_delay).await;
            }

            match self
                .resolve_inner(&item.track_key, item.song_name.as_deref(), item.artist.as_deref())
                .await
            {
                Ok(outcome) => {
                    throttle = outcome.contacted_provider;
                    results.push(outcome.result);
                }
                Err(e) => {
                    tracing::warn!(track_key = %item.track_key, error = %format!("{e:#}"), "batch item failed");
                    throttle = false;
                    results.push(LyricsResult::failed(&item.track_key, format!("{e:#}")));
                }
            }
        }

        results
    }

    pub async fn delete_cached(&self, track_key: &str) -> anyhow::Result<DeleteResponse> {
        let key = TrackKey::parse(track_key)?;
        let deleted_count = self
            .cache
            .delete_by_key(key.as_str())
            .await
            .with_context(|| format!("delete cached lyrics for {key}"))?;

        tracing::info!(track_key = %key, deleted_count, "cache delete");
        let message = if deleted_count > 0 {
            "lyrics deleted from cache"
        } else {
            "no lyrics found in cache"
        };
        Ok(DeleteResponse {
            success: true,
            deleted_count,
            message: message.to_string(),
        })
    }

    pub async fn search_cache(&self, query: &str) -> anyhow::Result<SearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            anyhow::bail!("search query must not be empty");
        }

        let entries = self
            .cache
            .search_text(query, SEARCH_LIMIT)
            .await
            .context("search lyrics cache")?;

        let results: Vec<SearchHit> = entries
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|e| SearchHit {
                lyrics_preview: preview(&e.lyrics_text),
                track_key: e.track_key,
                song_name: e.song_name,
                artist_name: e.artist_name,
            })
            .collect();

        Ok(SearchResponse {
            success: true,
            count: results.len(),
            results,
        })
    }

    pub async fn provider_health(&self) -> ProviderHealth {
        self.primary.health().await
    }
}

fn non_empty_or(preferred: &str, fallback: &str) -> String {
    let preferred = preferred.trim();
    if preferred.is_empty() {
        fallback.to_string()
    } else {
        preferred.to_string()
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}

fn log_step_failure(key: &TrackKey, provider: &str, err: &LyricsError) {
    if err.is_miss() {
        tracing::debug!(track_key = %key, provider, "no lyrics from provider");
    } else {
        tracing::warn!(track_key = %key, provider, error = %err, "provider step failed");
    }
}
