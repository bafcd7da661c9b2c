use thiserror::Error;

/// Failures raised by the lyrics providers and the cache write step.
///
/// Every variant except an infrastructure fault on the cache read path is
/// handled inside the resolver by moving on to the next source.
#[derive(Debug, Error)]
pub enum LyricsError {
    #[error("no lyrics found")]
    NotFound,

    #[error("{provider} is not configured")]
    NotConfigured { provider: &'static str },

    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider} page had no usable lyrics: {reason}")]
    ExtractionFailed {
        provider: &'static str,
        reason: String,
    },

    #[error("cache write failed: {0}")]
    CacheWriteFailed(String),
}

impl LyricsError {
    pub fn unavailable(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider,
            reason: reason.into(),
        }
    }

    pub fn extraction(provider: &'static str, reason: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            provider,
            reason: reason.into(),
        }
    }

    /// Wraps a reqwest failure, calling out timeouts explicitly.
    pub fn from_http(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::unavailable(provider, "request timed out")
        } else {
            Self::unavailable(provider, err.to_string())
        }
    }

    /// True for the plain "nothing there" outcome, which is not worth a warning.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
