use crate::lyrics::matching::MatchWeights;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Provider requests never wait less or longer than this.
const MIN_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub genius: GeniusConfig,
    pub fallback: FallbackConfig,
    pub batch: BatchConfig,
    pub matching: MatchWeights,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeniusConfig {
    pub base_url: String,
    /// Client access token from https://genius.com/api-clients.
    pub access_token: Option<String>,
    /// Used with `client_secret` for a client-credentials grant when no
    /// access token is set.
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pause between items that reached an external provider.
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Cleaned page text shorter than this is treated as a failed scrape.
    pub min_chars: usize,
}

fn clamp_timeout(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))
}

impl GeniusConfig {
    pub fn timeout(&self) -> Duration {
        clamp_timeout(self.timeout_secs)
    }
}

impl FallbackConfig {
    pub fn timeout(&self) -> Duration {
        clamp_timeout(self.timeout_secs)
    }
}

impl BatchConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.paths.data_dir.join("lyrics.sqlite3")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let proj = ProjectDirs::from("dev", "lyricache", "lyricache");
        let data_dir = proj
            .as_ref()
            .map(|p| p.data_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("lyricache"));
        Self { data_dir }
    }
}

impl Default for GeniusConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.genius.com".to_string(),
            access_token: None,
            client_id: None,
            client_secret: None,
            token_url: "https://api.genius.com/oauth/token".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.lyrics.ovh".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { delay_ms: 200 }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { min_chars: 50 }
    }
}

/// Secrets usually live in the environment rather than the config file.
pub fn apply_env_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = non_empty("GENIUS_ACCESS_TOKEN") {
        cfg.genius.access_token = Some(token);
    }
    if let Some(id) = non_empty("GENIUS_CLIENT_ID") {
        cfg.genius.client_id = Some(id);
    }
    if let Some(secret) = non_empty("GENIUS_CLIENT_SECRET") {
        cfg.genius.client_secret = Some(secret);
    }
    if let Some(dir) = non_empty("LYRICACHE_DATA_DIR") {
        cfg.paths.data_dir = PathBuf::from(dir);
    }
}

fn write_private(path: &Path, raw: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj =
        ProjectDirs::from("dev", "lyricache", "lyricache").context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

/// Reads the config file, writing defaults on first run. Env overrides are
/// applied on top but never persisted.
pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        toml::from_str::<Config>(&raw).with_context(|| format!("parse {}", path.display()))?
    } else {
        let cfg = Config::default();
        let raw = toml::to_string_pretty(&cfg).context("serialize default config")?;
        write_private(&path, &raw)?;
        tracing::info!(path = %path.display(), "wrote default config");
        cfg
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_writes_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.batch.delay_ms, 200);
        assert_eq!(cfg.extraction.min_chars, 50);
        assert_eq!(cfg.fallback.base_url, "https://api.lyrics.ovh");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[batch]\ndelay_ms = 50\n\n[matching]\nfeatured_artist = 10.0\n",
        )
        .unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.batch.delay_ms, 50);
        assert_eq!(cfg.matching.featured_artist, 10.0);
        assert_eq!(cfg.matching.title_exact, 100.0);
        assert_eq!(cfg.genius.base_url, "https://api.genius.com");
    }

    #[test]
    fn test_serialized_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.fallback.timeout_secs = 7;
        write_private(&path, &toml::to_string_pretty(&cfg).unwrap()).unwrap();

        let loaded = load(Some(&path)).unwrap();
        assert_eq!(loaded.fallback.timeout_secs, 7);
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg, |key| match key {
            "GENIUS_ACCESS_TOKEN" => Some("tok".to_string()),
            "GENIUS_CLIENT_ID" => Some("  ".to_string()),
            "LYRICACHE_DATA_DIR" => Some("/tmp/lyrics".to_string()),
            _ => None,
        });
        assert_eq!(cfg.genius.access_token.as_deref(), Some("tok"));
        assert!(cfg.genius.client_id.is_none());
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/lyrics/lyrics.sqlite3"));
    }

    #[test]
    fn test_timeouts_are_clamped() {
        let mut cfg = Config::default();
        cfg.genius.timeout_secs = 60;
        cfg.fallback.timeout_secs = 0;
        assert_eq!(cfg.genius.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.fallback.timeout(), Duration::from_secs(5));
    }
}
