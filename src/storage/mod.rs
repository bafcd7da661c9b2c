use crate::lyrics::models::SourceTag;
use anyhow::Context;
use async_trait::async_trait;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// One cached lyrics row. `track_key` is unique.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedLyrics {
    pub track_key: String,
    pub song_name: Option<String>,
    pub artist_name: Option<String>,
    pub lyrics_text: String,
    pub source_tag: SourceTag,
    pub updated_at: OffsetDateTime,
}

/// Persistent lyrics cache keyed by track id.
#[async_trait]
pub trait LyricsCache: Send + Sync {
    async fn find_by_key(&self, track_key: &str) -> anyhow::Result<Option<CachedLyrics>>;

    /// Inserts the entry, or overwrites the existing one for its key.
    async fn upsert(&self, entry: CachedLyrics) -> anyhow::Result<()>;

    /// Returns the number of rows removed (0 or 1).
    async fn delete_by_key(&self, track_key: &str) -> anyhow::Result<usize>;

    /// Case-insensitive substring match over song, artist and lyric text.
    async fn search_text(&self, query: &str, limit: usize) -> anyhow::Result<Vec<CachedLyrics>>;
}

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        let s = Self { conn };
        s.register_functions()?;
        s.init_schema()?;
        Ok(s)
    }

    // SQLite's LOWER() and LIKE only fold ASCII.
    fn register_functions(&self) -> anyhow::Result<()> {
        self.conn
            .create_scalar_function(
                "unicode_lower",
                1,
                FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
                |ctx| {
                    let value: Option<String> = ctx.get(0)?;
                    Ok(value.map(|v| v.to_lowercase()))
                },
            )
            .context("register unicode_lower")?;
        Ok(())
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
CREATE TABLE IF NOT EXISTS lyrics_cache (
  track_key TEXT PRIMARY KEY,
  song_name TEXT,
  artist_name TEXT,
  lyrics_text TEXT NOT NULL,
  source_tag TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_lyrics_updated_at ON lyrics_cache(updated_at DESC);
"#,
            )
            .context("init schema")?;
        Ok(())
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CachedLyrics> {
        let tag: String = row.get(4)?;
        let updated_at: i64 = row.get(5)?;
        Ok(CachedLyrics {
            track_key: row.get(0)?,
            song_name: row.get(1)?,
            artist_name: row.get(2)?,
            lyrics_text: row.get(3)?,
            source_tag: SourceTag::parse(&tag).unwrap_or(SourceTag::Cache),
            updated_at: OffsetDateTime::from_unix_timestamp(updated_at)
                .unwrap_or(OffsetDateTime::UNIX_EPOCH),
        })
    }

    pub fn get_lyrics(&self, track_key: &str) -> anyhow::Result<Option<CachedLyrics>> {
        self.conn
            .query_row(
                r#"
SELECT track_key, song_name, artist_name, lyrics_text, source_tag, updated_at
FROM lyrics_cache WHERE track_key=?1
"#,
                params![track_key],
                Self::row_to_entry,
            )
            .optional()
            .context("query cached lyrics")
    }

    pub fn cache_lyrics(&self, entry: &CachedLyrics) -> anyhow::Result<()> {
        self.conn
            .execute(
                r#"
INSERT INTO lyrics_cache(track_key, song_name, artist_name, lyrics_text, source_tag, updated_at)
VALUES(?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(track_key) DO UPDATE SET
  song_name=excluded.song_name,
  artist_name=excluded.artist_name,
  lyrics_text=excluded.lyrics_text,
  source_tag=excluded.source_tag,
  updated_at=excluded.updated_at
"#,
                params![
                    entry.track_key,
                    entry.song_name,
                    entry.artist_name,
                    entry.lyrics_text,
                    entry.source_tag.as_str(),
                    entry.updated_at.unix_timestamp()
                ],
            )
            .context("cache lyrics")?;
        Ok(())
    }

    pub fn delete_lyrics(&self, track_key: &str) -> anyhow::Result<usize> {
        self.conn
            .execute(
                "DELETE FROM lyrics_cache WHERE track_key=?1",
                params![track_key],
            )
            .context("delete cached lyrics")
    }

    /// Most recently updated matches first.
    pub fn search_lyrics(&self, query: &str, limit: usize) -> anyhow::Result<Vec<CachedLyrics>> {
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let mut stmt = self
            .conn
            .prepare(
                r#"
SELECT track_key, song_name, artist_name, lyrics_text, source_tag, updated_at
FROM lyrics_cache
WHERE unicode_lower(song_name) LIKE ?1 ESCAPE '\'
   OR unicode_lower(artist_name) LIKE ?1 ESCAPE '\'
   OR unicode_lower(lyrics_text) LIKE ?1 ESCAPE '\'
ORDER BY updated_at DESC
LIMIT ?2
"#,
            )
            .context("prepare lyrics search")?;

        let rows = stmt
            .query_map(params![pattern, limit as i64], Self::row_to_entry)
            .context("query lyrics search")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read lyrics search rows")
    }
}

fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// rusqlite is blocking: open a connection per operation on the blocking pool.
#[derive(Clone)]
pub struct SqliteLyricsCache {
    path: PathBuf,
}

impl SqliteLyricsCache {
    /// Opens once up front so a bad path or schema fails at startup.
    pub fn new(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        Storage::open(&path)?;
        Ok(Self { path })
    }

    async fn with_storage<T, F>(&self, op: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> anyhow::Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let storage = Storage::open(&path)?;
            op(&storage)
        })
        .await
        .context("storage task panicked")?
    }
}

#[async_trait]
impl LyricsCache for SqliteLyricsCache {
    async fn find_by_key(&self, track_key: &str) -> anyhow::Result<Option<CachedLyrics>> {
        let key = track_key.to_string();
        self.with_storage(move |s| s.get_lyrics(&key)).await
    }

    async fn upsert(&self, entry: CachedLyrics) -> anyhow::Result<()> {
        self.with_storage(move |s| s.cache_lyrics(&entry)).await
    }

    async fn delete_by_key(&self, track_key: &str) -> anyhow::Result<usize> {
        let key = track_key.to_string();
        self.with_storage(move |s| s.delete_lyrics(&key)).await
    }

    async fn search_text(&self, query: &str, limit: usize) -> anyhow::Result<Vec<CachedLyrics>> {
        let query = query.to_string();
        self.with_storage(move |s| s.search_lyrics(&query, limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, song: &str, artist: &str, text: &str, ts: i64) -> CachedLyrics {
        CachedLyrics {
            track_key: key.to_string(),
            song_name: Some(song.to_string()),
            artist_name: Some(artist.to_string()),
            lyrics_text: text.to_string(),
            source_tag: SourceTag::ProviderPrimary,
            updated_at: OffsetDateTime::from_unix_timestamp(ts).unwrap(),
        }
    }

    fn open_temp() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("db").join("lyrics.sqlite3")).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_upsert_overwrites_single_row() {
        let (_dir, s) = open_temp();
        s.cache_lyrics(&entry("k1", "Song", "Band", "old words", 100)).unwrap();

        let mut newer = entry("k1", "Song", "Band", "new words", 200);
        newer.source_tag = SourceTag::ProviderFallback;
        s.cache_lyrics(&newer).unwrap();

        let got = s.get_lyrics("k1").unwrap().unwrap();
        assert_eq!(got, newer);

        let count: i64 = s
            .conn
            .query_row("SELECT COUNT(*) FROM lyrics_cache", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_get_missing_is_none() {
        let (_dir, s) = open_temp();
        assert!(s.get_lyrics("nope").unwrap().is_none());
    }

    #[test]
    fn test_delete_reports_count() {
        let (_dir, s) = open_temp();
        s.cache_lyrics(&entry("k1", "Song", "Band", "words", 1)).unwrap();
        assert_eq!(s.delete_lyrics("k1").unwrap(), 1);
        assert_eq!(s.delete_lyrics("k1").unwrap(), 0);
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let (_dir, s) = open_temp();
        s.cache_lyrics(&entry("a", "Yesterday", "The Beatles", "all my troubles", 1)).unwrap();
        s.cache_lyrics(&entry("b", "Beatles Medley", "Cover Band", "la la", 2)).unwrap();
        s.cache_lyrics(&entry("c", "Other", "Someone", "sing like the BEATLES do", 3)).unwrap();
        s.cache_lyrics(&entry("d", "Unrelated", "Nobody", "nothing", 4)).unwrap();

        let hits = s.search_lyrics("beatles", 20).unwrap();
        let keys: Vec<_> = hits.iter().map(|h| h.track_key.as_str()).collect();
        assert_eq!(keys, vec!["c", "b", "a"]);

        assert_eq!(s.search_lyrics("beatles", 2).unwrap().len(), 2);
    }

    #[test]
    fn test_search_treats_wildcards_literally() {
        let (_dir, s) = open_temp();
        s.cache_lyrics(&entry("a", "100% Pure", "X", "text", 1)).unwrap();
        s.cache_lyrics(&entry("b", "1000 Pure", "X", "text", 2)).unwrap();

        let hits = s.search_lyrics("100%", 20).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].track_key, "a");
        assert!(s.search_lyrics("_", 20).unwrap().is_empty());
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let (_dir, s) = open_temp();
        s.cache_lyrics(&entry("a", "ÉLAN", "BJÖRK", "words", 1)).unwrap();
        s.cache_lyrics(&entry("b", "Other", "Someone", "Über alles, STRAßE", 2)).unwrap();

        assert_eq!(s.search_lyrics("björk", 20).unwrap().len(), 1);
        assert_eq!(s.search_lyrics("Björk", 20).unwrap().len(), 1);
        assert_eq!(s.search_lyrics("élan", 20).unwrap()[0].track_key, "a");
        assert_eq!(s.search_lyrics("über", 20).unwrap()[0].track_key, "b");
        assert_eq!(s.search_lyrics("straße", 20).unwrap()[0].track_key, "b");
    }

    #[tokio::test]
    async fn test_sqlite_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SqliteLyricsCache::new(dir.path().join("lyrics.sqlite3")).unwrap();

        cache.upsert(entry("k", "Song", "Band", "words", 10)).await.unwrap();
        let got = cache.find_by_key("k").await.unwrap().unwrap();
        assert_eq!(got.lyrics_text, "words");
        assert_eq!(cache.search_text("band", 20).await.unwrap().len(), 1);
        assert_eq!(cache.delete_by_key("k").await.unwrap(), 1);
        assert!(cache.find_by_key("k").await.unwrap().is_none());
    }
}
