use crate::lyrics::error::LyricsError;
use crate::lyrics::models::{Candidate, FallbackLyrics, ProviderHealth};
use async_trait::async_trait;

/// Search-based source whose hits must be scored and scraped.
#[async_trait]
pub trait PrimaryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ranked search hits for a free-text query; best first per the provider.
    async fn search(&self, query: &str) -> Result<Vec<Candidate>, LyricsError>;

    async fn fetch_page_html(&self, url: &str) -> Result<String, LyricsError>;

    async fn health(&self) -> ProviderHealth;
}

/// Exact artist/title lookup used when the primary source comes up empty.
#[async_trait]
pub trait FallbackProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the provider has no lyrics for this pair.
    async fn fetch_by_artist_and_title(
        &self,
        artist: &str,
        title: &str,
    ) -> Result<Option<FallbackLyrics>, LyricsError>;
}
