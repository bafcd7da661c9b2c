//! Bearer credentials for provider APIs.
//!
//! Tokens are fetched lazily on first use and refreshed when they are about
//! to expire. There is no background timer: a caller that needs a token
//! either gets the cached one or triggers the refresh itself.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Refresh this long before the provider-reported expiry.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> anyhow::Result<String>;

    /// Drops any cached token, e.g. after the provider answered 401.
    fn invalidate(&self) {}
}

/// A long-lived client access token from config.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub expires_in: Duration,
}

#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<IssuedToken>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// OAuth2 client-credentials grant against a token endpoint.
pub struct OAuthTokenEndpoint {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl OAuthTokenEndpoint {
    const DEFAULT_EXPIRES_IN: u64 = 3600;

    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build token http client")?;
        Ok(Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }
}

#[async_trait]
impl TokenFetcher for OAuthTokenEndpoint {
    async fn fetch(&self) -> anyhow::Result<IssuedToken> {
        let body = format!(
            "grant_type=client_credentials&client_id={}&client_secret={}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.client_secret)
        );

        let resp: TokenResponse = self
            .http
            .post(&self.token_url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .context("send token request")?
            .error_for_status()
            .context("token http status")?
            .json()
            .await
            .context("parse token json")?;

        Ok(IssuedToken {
            value: resp.access_token,
            expires_in: Duration::from_secs(resp.expires_in.unwrap_or(Self::DEFAULT_EXPIRES_IN)),
        })
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + EXPIRY_SKEW < self.expires_at
    }
}

/// Caches a fetched token and refreshes it once it nears expiry.
///
/// The mutex only guards the cached value; it is never held across the
/// fetch, so concurrent callers with a stale token may each refresh.
pub struct ClientCredentials<F> {
    fetcher: F,
    cached: Mutex<Option<CachedToken>>,
}

impl<F: TokenFetcher> ClientCredentials<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cached: Mutex::new(None),
        }
    }

    fn cached_value(&self, now: Instant) -> Option<String> {
        let guard = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|t| t.is_fresh(now))
            .map(|t| t.value.clone())
    }
}

#[async_trait]
impl<F: TokenFetcher> CredentialProvider for ClientCredentials<F> {
    async fn access_token(&self) -> anyhow::Result<String> {
        if let Some(token) = self.cached_value(Instant::now()) {
            return Ok(token);
        }

        let issued = self.fetcher.fetch().await.context("refresh access token")?;
        tracing::info!(expires_in_secs = issued.expires_in.as_secs(), "access token refreshed");

        let mut guard = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(CachedToken {
            value: issued.value.clone(),
            expires_at: Instant::now() + issued.expires_in,
        });
        Ok(issued.value)
    }

    fn invalidate(&self) {
        let mut guard = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }
}

/// Builds the provider from config, if any credentials are set.
pub fn from_config(
    cfg: &crate::config::GeniusConfig,
) -> anyhow::Result<Option<Arc<dyn CredentialProvider>>> {
    if let Some(token) = cfg.access_token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(Some(Arc::new(StaticToken::new(token))));
    }

    match (cfg.client_id.as_deref(), cfg.client_secret.as_deref()) {
        (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
            let endpoint =
                OAuthTokenEndpoint::new(&cfg.token_url, id, secret, cfg.timeout())?;
            Ok(Some(Arc::new(ClientCredentials::new(endpoint))))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        expires_in: Duration,
    }

    impl CountingFetcher {
        fn new(expires_in: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                expires_in,
            }
        }
    }

    #[async_trait]
    impl TokenFetcher for CountingFetcher {
        async fn fetch(&self) -> anyhow::Result<IssuedToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(IssuedToken {
                value: format!("token-{n}"),
                expires_in: self.expires_in,
            })
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl TokenFetcher for FailingFetcher {
        async fn fetch(&self) -> anyhow::Result<IssuedToken> {
            anyhow::bail!("token endpoint down")
        }
    }

    #[tokio::test]
    async fn test_token_is_reused_while_fresh() {
        let creds = ClientCredentials::new(CountingFetcher::new(Duration::from_secs(3600)));
        assert_eq!(creds.access_token().await.unwrap(), "token-1");
        assert_eq!(creds.access_token().await.unwrap(), "token-1");
        assert_eq!(creds.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_within_skew_is_refreshed() {
        // Shorter than the skew, so it is already stale when cached.
        let creds = ClientCredentials::new(CountingFetcher::new(Duration::from_secs(30)));
        assert_eq!(creds.access_token().await.unwrap(), "token-1");
        assert_eq!(creds.access_token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let creds = ClientCredentials::new(CountingFetcher::new(Duration::from_secs(3600)));
        creds.access_token().await.unwrap();
        creds.invalidate();
        assert_eq!(creds.access_token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let creds = ClientCredentials::new(FailingFetcher);
        let err = creds.access_token().await.unwrap_err();
        assert!(format!("{err:#}").contains("token endpoint down"));
    }

    #[tokio::test]
    async fn test_from_config_prefers_static_token() {
        let cfg = crate::config::GeniusConfig {
            access_token: Some("abc".into()),
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            ..Default::default()
        };
        let creds = from_config(&cfg).unwrap().unwrap();
        assert_eq!(creds.access_token().await.unwrap(), "abc");

        let empty = crate::config::GeniusConfig::default();
        assert!(from_config(&empty).unwrap().is_none());
    }
}
