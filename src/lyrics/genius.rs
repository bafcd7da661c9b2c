//! Genius API client
//!
//! Search goes through the authenticated REST API; lyric text itself is only
//! available on the public song page, which is fetched as HTML.
//! API Documentation: https://docs.genius.com

use crate::auth::CredentialProvider;
use crate::lyrics::error::LyricsError;
use crate::lyrics::models::{Candidate, HealthStatus, ProviderHealth};
use crate::lyrics::provider::PrimaryProvider;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT_LANGUAGE, AUTHORIZATION};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: &str = "genius";

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchBody,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    result: Option<SongResult>,
}

// Non-song hits share the envelope but not the song fields.
#[derive(Debug, Deserialize)]
struct SongResult {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    primary_artist: Option<ArtistRef>,
    #[serde(default)]
    stats: Option<SongStats>,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct SongStats {
    #[serde(default)]
    pageviews: Option<u64>,
}

impl SongResult {
    fn into_candidate(self) -> Option<Candidate> {
        Some(Candidate {
            id: self.id?,
            title: self.title?,
            primary_artist_name: self.primary_artist.map(|a| a.name).unwrap_or_default(),
            url: self.url?,
            view_count: self.stats.and_then(|s| s.pageviews),
        })
    }
}

fn parse_search(body: &str) -> anyhow::Result<Vec<Candidate>> {
    let envelope: SearchEnvelope = serde_json::from_str(body).context("parse genius search json")?;
    Ok(envelope
        .response
        .hits
        .into_iter()
        .filter(|h| h.kind.as_deref().is_none_or(|k| k == "song"))
        .filter_map(|h| h.result?.into_candidate())
        .collect())
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct GeniusClient {
    api: reqwest::Client,
    pages: reqwest::Client,
    base_url: String,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl GeniusClient {
    const USER_AGENT: &'static str = concat!("lyricache/", env!("CARGO_PKG_VERSION"));
    // Song pages answer a bare client UA with a challenge page.
    const PAGE_USER_AGENT: &'static str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

    pub fn new(
        base_url: impl Into<String>,
        credentials: Option<Arc<dyn CredentialProvider>>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let api = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(timeout)
            .build()
            .context("build genius api client")?;
        let pages = reqwest::Client::builder()
            .user_agent(Self::PAGE_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("build genius page client")?;

        Ok(Self {
            api,
            pages,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn search_url(&self, query: &str) -> String {
        format!("{}/search?q={}", self.base_url, urlencoding::encode(query))
    }

    async fn bearer(&self) -> Result<String, LyricsError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or(LyricsError::NotConfigured { provider: PROVIDER })?;
        let token = creds
            .access_token()
            .await
            .map_err(|e| LyricsError::unavailable(PROVIDER, format!("{e:#}")))?;
        Ok(format!("Bearer {token}"))
    }

    async fn send_search(&self, query: &str) -> Result<reqwest::Response, LyricsError> {
        let bearer = self.bearer().await?;
        let response = self
            .api
            .get(self.search_url(query))
            .header(AUTHORIZATION, bearer)
            .send()
            .await
            .map_err(|e| LyricsError::from_http(PROVIDER, e))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            && let Some(creds) = &self.credentials
        {
            creds.invalidate();
        }
        Ok(response)
    }
}

#[async_trait]
impl PrimaryProvider for GeniusClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search(&self, query: &str) -> Result<Vec<Candidate>, LyricsError> {
        let response = self.send_search(query).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LyricsError::unavailable(PROVIDER, format!("search HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LyricsError::from_http(PROVIDER, e))?;
        parse_search(&body).map_err(|e| LyricsError::unavailable(PROVIDER, format!("{e:#}")))
    }

    async fn fetch_page_html(&self, url: &str) -> Result<String, LyricsError> {
        let response = self
            .pages
            .get(url)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| LyricsError::from_http(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LyricsError::unavailable(PROVIDER, format!("page HTTP {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| LyricsError::from_http(PROVIDER, e))
    }

    async fn health(&self) -> ProviderHealth {
        if self.credentials.is_none() {
            return ProviderHealth::not_configured("Genius access token not configured");
        }

        let response = match self.send_search("test").await {
            Ok(r) => r,
            Err(e) => return ProviderHealth::error(None, e.to_string()),
        };

        let status = response.status();
        let headers = response.headers();
        let mut health = if status.is_success() {
            ProviderHealth {
                configured: true,
                status: Some(HealthStatus::Operational),
                rate_limit_remaining: None,
                rate_limit_reset: None,
                status_code: Some(status.as_u16()),
                message: None,
            }
        } else {
            ProviderHealth::error(Some(status.as_u16()), format!("search HTTP {status}"))
        };
        health.rate_limit_remaining = header_string(headers, "x-ratelimit-remaining");
        health.rate_limit_reset = header_string(headers, "x-ratelimit-reset");
        health
    }
}
