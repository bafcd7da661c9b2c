//! lyrics.ovh API client
//!
//! Exact lookup by artist and title; no key required.
//! API Documentation: https://lyricsovh.docs.apiary.io

use crate::lyrics::error::LyricsError;
use crate::lyrics::models::FallbackLyrics;
use crate::lyrics::provider::FallbackProvider;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const PROVIDER: &str = "lyrics.ovh";

#[derive(Debug, Deserialize)]
struct OvhResponse {
    #[serde(default)]
    lyrics: Option<String>,
}

fn parse_lyrics(body: &str) -> anyhow::Result<Option<FallbackLyrics>> {
    let resp: OvhResponse = serde_json::from_str(body).context("parse lyrics.ovh json")?;
    Ok(resp
        .lyrics
        .filter(|l| !l.trim().is_empty())
        .map(|lyrics_text| FallbackLyrics { lyrics_text }))
}

#[derive(Debug, Clone)]
pub struct LyricsOvhClient {
    client: reqwest::Client,
    base_url: String,
}

impl LyricsOvhClient {
    const USER_AGENT: &'static str = concat!("lyricache/", env!("CARGO_PKG_VERSION"));

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(timeout)
            .build()
            .context("build lyrics.ovh client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn lookup_url(&self, artist: &str, title: &str) -> String {
        format!(
            "{}/v1/{}/{}",
            self.base_url,
            urlencoding::encode(artist),
            urlencoding::encode(title)
        )
    }
}

#[async_trait]
impl FallbackProvider for LyricsOvhClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_by_artist_and_title(
        &self,
        artist: &str,
        title: &str,
    ) -> Result<Option<FallbackLyrics>, LyricsError> {
        let response = self
            .client
            .get(self.lookup_url(artist, title))
            .send()
            .await
            .map_err(|e| LyricsError::from_http(PROVIDER, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LyricsError::unavailable(PROVIDER, format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| LyricsError::from_http(PROVIDER, e))?;
        parse_lyrics(&body).map_err(|e| LyricsError::unavailable(PROVIDER, format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_url_encodes_path_segments() {
        let client = LyricsOvhClient::new("https://api.lyrics.ovh/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.lookup_url("AC/DC", "Back In Black"),
            "https://api.lyrics.ovh/v1/AC%2FDC/Back%20In%20Black"
        );
    }

    #[test]
    fn test_parse_lyrics() {
        let got = parse_lyrics(r#"{"lyrics":"Yesterday\nAll my troubles"}"#).unwrap().unwrap();
        assert_eq!(got.lyrics_text, "Yesterday\nAll my troubles");

        assert!(parse_lyrics(r#"{"lyrics":"   "}"#).unwrap().is_none());
        assert!(parse_lyrics(r#"{"error":"No lyrics found"}"#).unwrap().is_none());
    }
}
