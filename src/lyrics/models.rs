use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_TRACK_KEY_LEN: usize = 128;

/// External catalog track id used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackKey(String);

impl TrackKey {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let key = raw.trim();
        if key.is_empty() {
            anyhow::bail!("track key must not be empty");
        }
        if key.chars().count() > MAX_TRACK_KEY_LEN {
            anyhow::bail!("track key longer than {MAX_TRACK_KEY_LEN} characters");
        }
        if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
            anyhow::bail!("track key contains whitespace or control characters");
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trims a caller hint, treating blank input as absent.
pub fn clean_hint(hint: Option<&str>) -> Option<String> {
    hint.map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}

/// Where a piece of lyric text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    Cache,
    ProviderPrimary,
    ProviderFallback,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Cache => "cache",
            SourceTag::ProviderPrimary => "provider-primary",
            SourceTag::ProviderFallback => "provider-fallback",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cache" => Some(SourceTag::Cache),
            "provider-primary" => Some(SourceTag::ProviderPrimary),
            "provider-fallback" => Some(SourceTag::ProviderFallback),
            _ => None,
        }
    }
}

/// A search hit returned by the primary provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: u64,
    pub title: String,
    pub primary_artist_name: String,
    pub url: String,
    pub view_count: Option<u64>,
}

/// Lyrics returned by the fallback provider.
#[derive(Debug, Clone)]
pub struct FallbackLyrics {
    pub lyrics_text: String,
}

/// Outcome of a single resolution, as handed to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsResult {
    pub success: bool,
    pub track_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LyricsResult {
    pub fn found(
        track_key: &str,
        source: SourceTag,
        song_name: Option<String>,
        artist_name: Option<String>,
        lyrics: String,
    ) -> Self {
        Self {
            success: true,
            track_key: track_key.to_string(),
            source: Some(source),
            song_name,
            artist_name,
            lyrics: Some(lyrics),
            message: None,
        }
    }

    pub fn failed(track_key: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            track_key: track_key.to_string(),
            source: None,
            song_name: None,
            artist_name: None,
            lyrics: None,
            message: Some(message.into()),
        }
    }
}

/// One entry of a batch request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub track_key: String,
    #[serde(default, alias = "name")]
    pub song_name: Option<String>,
    #[serde(default, alias = "artistName")]
    pub artist: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub track_key: String,
    pub song_name: Option<String>,
    pub artist_name: Option<String>,
    pub lyrics_preview: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub count: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Operational,
    Error,
}

/// Status report for the primary provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<HealthStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_remaining: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_reset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProviderHealth {
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self {
            configured: false,
            status: None,
            rate_limit_remaining: None,
            rate_limit_reset: None,
            status_code: None,
            message: Some(message.into()),
        }
    }

    pub fn error(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            configured: true,
            status: Some(HealthStatus::Error),
            rate_limit_remaining: None,
            rate_limit_reset: None,
            status_code,
            message: Some(message.into()),
        }
    }
}
