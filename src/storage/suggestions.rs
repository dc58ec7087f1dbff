use deadpool_sqlite::Pool;
use moka::sync::Cache;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use super::CacheError;

const DB_FILE_NAME: &str = "suggestions.db";

/// Longest TTL handed to moka. Its builder panics past 1000 years, and hot
/// entries are checked against `expires_at` anyway.
const MAX_HOT_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A live row of the suggestion cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedSuggestion {
    pub command: String,
    pub suggestion: String,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone)]
struct HotEntry {
    suggestion: String,
    expires_at: i64,
}

/// Persistent command → suggestion cache with a single global TTL.
///
/// SQLite is the source of truth. A bounded moka cache sits in front of it
/// and carries each row's `expires_at`, so a hot entry is never served past
/// the expiry recorded on disk.
#[derive(Clone)]
pub struct SuggestionStore {
    pool: Pool,
    hot: Cache<String, HotEntry>,
    ttl_ms: i64,
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl SuggestionStore {
    /// Open (creating if needed) the cache database inside `dir`.
    pub async fn open(dir: &Path, ttl_secs: u64, memory_capacity: u64) -> Result<Self, CacheError> {
        tokio::fs::create_dir_all(dir).await?;
        let pool = super::sqlite::create_pool(&dir.join(DB_FILE_NAME))?;
        super::sqlite::init_pool(&pool).await?;
        Ok(Self::with_pool(pool, ttl_secs, memory_capacity))
    }

    /// Wrap an already-migrated pool.
    pub fn with_pool(pool: Pool, ttl_secs: u64, memory_capacity: u64) -> Self {
        Self {
            pool,
            hot: Cache::builder()
                .time_to_live(Duration::from_secs(ttl_secs).min(MAX_HOT_TTL))
                .max_capacity(memory_capacity)
                .build(),
            ttl_ms: i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX),
        }
    }

    pub async fn get(&self, command: &str) -> Result<Option<String>, CacheError> {
        self.get_at(command, now_ms()).await
    }

    /// Look up `command` as of `now` (unix millis). Expired rows read as absent.
    pub async fn get_at(&self, command: &str, now: i64) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.hot.get(command) {
            if entry.expires_at > now {
                return Ok(Some(entry.suggestion));
            }
            self.hot.invalidate(command);
        }

        let conn = self.pool.get().await?;
        let key = command.to_string();
        let row = conn
            .interact(move |conn| {
                conn.query_row(
                    "SELECT suggestion, expires_at FROM suggestions
                     WHERE command = ?1 AND expires_at > ?2",
                    params![key, now],
                    |row| {
                        Ok(HotEntry {
                            suggestion: row.get(0)?,
                            expires_at: row.get(1)?,
                        })
                    },
                )
                .optional()
            })
            .await??;

        Ok(row.map(|entry| {
            let suggestion = entry.suggestion.clone();
            self.hot.insert(command.to_string(), entry);
            suggestion
        }))
    }

    pub async fn put(&self, command: &str, suggestion: &str) -> Result<(), CacheError> {
        self.put_at(command, suggestion, now_ms()).await
    }

    /// Insert or overwrite `command`, expiring `ttl` after `now` (unix millis).
    pub async fn put_at(&self, command: &str, suggestion: &str, now: i64) -> Result<(), CacheError> {
        let expires_at = now.saturating_add(self.ttl_ms);
        let conn = self.pool.get().await?;
        let key = command.to_string();
        let value = suggestion.to_string();

        conn.interact(move |conn| {
            conn.execute(
                "INSERT INTO suggestions (command, suggestion, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (command) DO UPDATE SET
                    suggestion = excluded.suggestion,
                    created_at = excluded.created_at,
                    expires_at = excluded.expires_at",
                params![key, value, now, expires_at],
            )
        })
        .await??;

        self.hot.insert(
            command.to_string(),
            HotEntry {
                suggestion: suggestion.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<CachedSuggestion>, CacheError> {
        self.list_all_at(now_ms()).await
    }

    /// All entries live at `now`, newest first.
    pub async fn list_all_at(&self, now: i64) -> Result<Vec<CachedSuggestion>, CacheError> {
        let conn = self.pool.get().await?;
        let rows = conn
            .interact(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT command, suggestion, created_at, expires_at FROM suggestions
                     WHERE expires_at > ?1
                     ORDER BY created_at DESC",
                )?;
                let rows = stmt.query_map(params![now], |row| {
                    Ok(CachedSuggestion {
                        command: row.get(0)?,
                        suggestion: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await??;
        Ok(rows)
    }

    /// Number of entries live at `now`.
    pub async fn count_at(&self, now: i64) -> Result<i64, CacheError> {
        let conn = self.pool.get().await?;
        let count = conn
            .interact(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM suggestions WHERE expires_at > ?1",
                    params![now],
                    |row| row.get(0),
                )
            })
            .await??;
        Ok(count)
    }

    /// Physically delete rows that expired at or before `now`. Returns rows removed.
    pub async fn prune_expired_at(&self, now: i64) -> Result<usize, CacheError> {
        let conn = self.pool.get().await?;
        let deleted = conn
            .interact(move |conn| {
                conn.execute(
                    "DELETE FROM suggestions WHERE expires_at <= ?1",
                    params![now],
                )
            })
            .await??;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_SECS: u64 = 3600;
    const HOUR_MS: i64 = 3_600_000;

    async fn open_store(dir: &Path) -> SuggestionStore {
        SuggestionStore::open(dir, HOUR_SECS, 100).await.unwrap()
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        assert_eq!(store.get("never-seen").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;

        store.put("ls -la", "use exa").await.unwrap();
        assert_eq!(store.get("ls -la").await.unwrap().as_deref(), Some("use exa"));
        store.put("ls -la", "use exa").await.unwrap();
        assert_eq!(store.get("ls -la").await.unwrap().as_deref(), Some("use exa"));

        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_put_overwrites_and_refreshes_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;

        store.put_at("git st", "old", 0).await.unwrap();
        store.put_at("git st", "new", HOUR_MS / 2).await.unwrap();

        // Past the first write's expiry but inside the second's.
        let later = HOUR_MS + 1;
        assert_eq!(store.get_at("git st", later).await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;

        store.put_at("make", "use just", 1_000).await.unwrap();
        assert!(store.get_at("make", 1_000 + HOUR_MS - 1).await.unwrap().is_some());
        assert!(store.get_at("make", 1_000 + HOUR_MS).await.unwrap().is_none());
        assert!(store.list_all_at(1_000 + HOUR_MS).await.unwrap().is_empty());
        assert_eq!(store.count_at(1_000 + HOUR_MS).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_all_skips_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;

        store.put_at("old", "a", 0).await.unwrap();
        store.put_at("fresh", "b", HOUR_MS).await.unwrap();

        let live = store.list_all_at(HOUR_MS + 10).await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].command, "fresh");
        assert_eq!(live[0].expires_at, 2 * HOUR_MS);
    }

    #[tokio::test]
    async fn test_prune_removes_only_expired_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;

        store.put_at("old", "a", 0).await.unwrap();
        store.put_at("fresh", "b", HOUR_MS).await.unwrap();

        let deleted = store.prune_expired_at(HOUR_MS + 10).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count_at(HOUR_MS + 10).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open_store(dir.path()).await;
            store.put("docker ps", "add --format").await.unwrap();
        }
        let reopened = open_store(dir.path()).await;
        assert_eq!(
            reopened.get("docker ps").await.unwrap().as_deref(),
            Some("add --format")
        );
    }

    #[tokio::test]
    async fn test_open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        open_store(&nested).await;
        assert!(nested.join(DB_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_open_fails_when_dir_is_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = SuggestionStore::open(file.path(), HOUR_SECS, 100).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_huge_ttl_opens_and_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = SuggestionStore::open(dir.path(), 40_000_000_000, 100)
            .await
            .unwrap();

        store.put_at("ls", "use eza", 0).await.unwrap();
        let far_future = 10_000_000_000_000;
        assert_eq!(
            store.get_at("ls", far_future).await.unwrap().as_deref(),
            Some("use eza")
        );
    }

    #[tokio::test]
    async fn test_keys_are_exact_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path()).await;
        store.put("ls", "x").await.unwrap();
        assert!(store.get("LS").await.unwrap().is_none());
        assert!(store.get("ls ").await.unwrap().is_none());
    }
}
