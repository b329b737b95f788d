use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{
    CacheKey, SessionStatus, Statistics, Storage, TranslationCacheEntry, TranslationSession,
    cleanup_cutoff, estimate_hit_rate,
};
use crate::error::{Error, Result};

const SESSION_COLUMNS: &str = "id, title, input_file, output_file, source_language, \
     target_language, provider, model, status, progress, current_chapter, total_chapters, \
     items_total, items_completed, items_failed, start_time, end_time, error_message, \
     created_at, updated_at";

/// Durable storage in a single `SQLite` file.
///
/// Each call opens its own connection on the blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Opens (and if needed creates) the database at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = path.into();

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let storage = Self { db_path };
        storage.with_connection(|conn| init_db(conn)).await?;
        tracing::debug!(path = %storage.db_path.display(), "sqlite storage ready");
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = connect(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| Error::Storage(format!("sqlite task failed: {e}")))?
    }
}

fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            input_file TEXT NOT NULL DEFAULT '',
            output_file TEXT NOT NULL DEFAULT '',
            source_language TEXT NOT NULL,
            target_language TEXT NOT NULL,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            status TEXT NOT NULL,
            progress REAL NOT NULL DEFAULT 0,
            current_chapter INTEGER NOT NULL DEFAULT 0,
            total_chapters INTEGER NOT NULL DEFAULT 0,
            items_total INTEGER NOT NULL DEFAULT 0,
            items_completed INTEGER NOT NULL DEFAULT 0,
            items_failed INTEGER NOT NULL DEFAULT 0,
            start_time INTEGER NOT NULL,
            end_time INTEGER,
            error_message TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_created_at ON sessions(created_at);
        CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);

        CREATE TABLE IF NOT EXISTS translation_cache (
            id TEXT PRIMARY KEY,
            source_text TEXT NOT NULL,
            source_language TEXT NOT NULL,
            target_language TEXT NOT NULL,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            target_text TEXT NOT NULL,
            access_count INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            last_accessed_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_cache_last_accessed ON translation_cache(last_accessed_at);",
    )?;
    Ok(())
}

impl ToSql for SessionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SessionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: Error| FromSqlError::Other(Box::new(e)))
    }
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<TranslationSession> {
    let end_time = match row.get::<_, Option<i64>>(16)? {
        Some(ms) => Some(
            DateTime::from_timestamp_millis(ms)
                .ok_or(rusqlite::Error::IntegralValueOutOfRange(16, ms))?,
        ),
        None => None,
    };

    Ok(TranslationSession {
        id: row.get(0)?,
        title: row.get(1)?,
        input_file: row.get(2)?,
        output_file: row.get(3)?,
        source_language: row.get(4)?,
        target_language: row.get(5)?,
        provider: row.get(6)?,
        model: row.get(7)?,
        status: row.get(8)?,
        progress: row.get(9)?,
        current_chapter: row.get(10)?,
        total_chapters: row.get(11)?,
        items_total: row.get::<_, i64>(12)? as u64,
        items_completed: row.get::<_, i64>(13)? as u64,
        items_failed: row.get::<_, i64>(14)? as u64,
        start_time: timestamp(row, 15)?,
        end_time,
        error_message: row.get(17)?,
        created_at: timestamp(row, 18)?,
        updated_at: timestamp(row, 19)?,
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<TranslationCacheEntry> {
    Ok(TranslationCacheEntry {
        key: CacheKey {
            source_text: row.get(0)?,
            source_language: row.get(1)?,
            target_language: row.get(2)?,
            provider: row.get(3)?,
            model: row.get(4)?,
        },
        target_text: row.get(5)?,
        access_count: row.get::<_, i64>(6)? as u64,
        created_at: timestamp(row, 7)?,
        last_accessed_at: timestamp(row, 8)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if matches!(e.code, ErrorCode::ConstraintViolation)
    )
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_session(&self, session: &TranslationSession) -> Result<()> {
        let s = session.clone();
        self.with_connection(move |conn| {
            let result = conn.execute(
                &format!(
                    "INSERT INTO sessions ({SESSION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                             ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
                ),
                params![
                    s.id,
                    s.title,
                    s.input_file,
                    s.output_file,
                    s.source_language,
                    s.target_language,
                    s.provider,
                    s.model,
                    s.status,
                    s.progress,
                    s.current_chapter,
                    s.total_chapters,
                    s.items_total as i64,
                    s.items_completed as i64,
                    s.items_failed as i64,
                    millis(s.start_time),
                    s.end_time.map(millis),
                    s.error_message,
                    millis(s.created_at),
                    millis(s.updated_at),
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_constraint_violation(&e) => Err(Error::SessionExists(s.id)),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_session(&self, id: &str) -> Result<Option<TranslationSession>> {
        let id = id.to_string();
        self.with_connection(move |conn| {
            let session = conn
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                    [&id],
                    session_from_row,
                )
                .optional()?;
            Ok(session)
        })
        .await
    }

    async fn update_session(&self, session: &TranslationSession) -> Result<()> {
        let s = session.clone();
        self.with_connection(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET
                    title = ?2, input_file = ?3, output_file = ?4, source_language = ?5,
                    target_language = ?6, provider = ?7, model = ?8, status = ?9,
                    progress = ?10, current_chapter = ?11, total_chapters = ?12,
                    items_total = ?13, items_completed = ?14, items_failed = ?15,
                    start_time = ?16, end_time = ?17, error_message = ?18, updated_at = ?19
                 WHERE id = ?1",
                params![
                    s.id,
                    s.title,
                    s.input_file,
                    s.output_file,
                    s.source_language,
                    s.target_language,
                    s.provider,
                    s.model,
                    s.status,
                    s.progress,
                    s.current_chapter,
                    s.total_chapters,
                    s.items_total as i64,
                    s.items_completed as i64,
                    s.items_failed as i64,
                    millis(s.start_time),
                    s.end_time.map(millis),
                    s.error_message,
                    millis(Utc::now()),
                ],
            )?;

            if changed == 0 {
                Err(Error::SessionNotFound(s.id))
            } else {
                Ok(())
            }
        })
        .await
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_connection(move |conn| {
            let changed = conn.execute("DELETE FROM sessions WHERE id = ?1", [&id])?;
            if changed == 0 {
                Err(Error::SessionNotFound(id))
            } else {
                Ok(())
            }
        })
        .await
    }

    async fn list_sessions(&self, limit: usize, offset: usize) -> Result<Vec<TranslationSession>> {
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 ORDER BY created_at DESC, id ASC
                 LIMIT ?1 OFFSET ?2"
            ))?;
            let sessions = stmt
                .query_map(params![limit as i64, offset as i64], session_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(sessions)
        })
        .await
    }

    async fn get_cached_translation(
        &self,
        key: &CacheKey,
    ) -> Result<Option<TranslationCacheEntry>> {
        let key = key.clone();
        self.with_connection(move |conn| {
            let digest = key.digest();
            let tx = conn.transaction()?;

            let found = tx
                .query_row(
                    "SELECT source_text, source_language, target_language, provider, model,
                            target_text, access_count, created_at, last_accessed_at
                     FROM translation_cache WHERE id = ?1",
                    [&digest],
                    entry_from_row,
                )
                .optional()?;

            // The digest narrows the row; the key itself decides the match.
            let Some(mut entry) = found.filter(|e| e.key == key) else {
                return Ok(None);
            };

            entry.touch();
            tx.execute(
                "UPDATE translation_cache
                 SET access_count = ?2, last_accessed_at = ?3
                 WHERE id = ?1",
                params![
                    digest,
                    entry.access_count as i64,
                    millis(entry.last_accessed_at)
                ],
            )?;
            tx.commit()?;

            Ok(Some(entry))
        })
        .await
    }

    async fn cache_translation(&self, entry: &TranslationCacheEntry) -> Result<()> {
        let e = entry.clone();
        self.with_connection(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO translation_cache
                 (id, source_text, source_language, target_language, provider, model,
                  target_text, access_count, created_at, last_accessed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    e.key.digest(),
                    e.key.source_text,
                    e.key.source_language,
                    e.key.target_language,
                    e.key.provider,
                    e.key.model,
                    e.target_text,
                    e.access_count as i64,
                    millis(e.created_at),
                    millis(e.last_accessed_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn cleanup_old_cache(&self, older_than: Duration) -> Result<usize> {
        let Some(cutoff) = cleanup_cutoff(older_than).map(millis) else {
            return Ok(0);
        };
        let removed = self
            .with_connection(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM translation_cache WHERE last_accessed_at < ?1",
                    [cutoff],
                )?)
            })
            .await?;

        tracing::debug!(removed, "cleaned old cache entries");
        Ok(removed)
    }

    async fn statistics(&self) -> Result<Statistics> {
        self.with_connection(|conn| {
            let (total, completed, failed, in_progress): (i64, i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'completed'), 0),
                        COALESCE(SUM(status = 'error'), 0),
                        COALESCE(SUM(status = 'translating'), 0)
                 FROM sessions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

            let average: Option<f64> = conn.query_row(
                "SELECT AVG((end_time - start_time) / 1000.0)
                 FROM sessions
                 WHERE status = 'completed' AND end_time IS NOT NULL",
                [],
                |row| row.get(0),
            )?;

            let (entries, accesses): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(access_count), 0) FROM translation_cache",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            Ok(Statistics {
                total_sessions: total as u64,
                completed_sessions: completed as u64,
                failed_sessions: failed as u64,
                in_progress_sessions: in_progress as u64,
                total_translations: entries as u64,
                cache_hit_rate: estimate_hit_rate(accesses as u64, entries as u64),
                average_duration_secs: average.unwrap_or(0.0),
            })
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_storage(temp_dir: &TempDir) -> SqliteStorage {
        SqliteStorage::open(temp_dir.path().join("tomes.db"))
            .await
            .unwrap()
    }

    fn create_test_key() -> CacheKey {
        CacheKey::new("Hello, World!", "en", "ja", "ollama", "gemma3:12b")
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let temp_dir = TempDir::new().unwrap();
        let storage = create_test_storage(&temp_dir).await;

        let result = storage.get_cached_translation(&create_test_key()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_counts_access() {
        let temp_dir = TempDir::new().unwrap();
        let storage = create_test_storage(&temp_dir).await;
        let key = create_test_key();

        storage
            .cache_translation(&TranslationCacheEntry::new(key.clone(), "こんにちは、世界！"))
            .await
            .unwrap();

        let first = storage.get_cached_translation(&key).await.unwrap().unwrap();
        let second = storage.get_cached_translation(&key).await.unwrap().unwrap();
        assert_eq!(first.target_text, "こんにちは、世界！");
        assert_eq!(second.target_text, first.target_text);
        assert_eq!(second.access_count, first.access_count + 1);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let storage = create_test_storage(&temp_dir).await;
        let session = TranslationSession::new("s1", "Book", "en", "sr", "ollama", "m");
        storage.create_session(&session).await.unwrap();
        storage.close().await.unwrap();
        drop(storage);

        let reopened = create_test_storage(&temp_dir).await;
        let loaded = reopened.get_session("s1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Book");
        assert_eq!(loaded.status, SessionStatus::Initializing);
        assert_eq!(
            loaded.start_time.timestamp_millis(),
            session.start_time.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_duplicate_session_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = create_test_storage(&temp_dir).await;
        let session = TranslationSession::new("s1", "Book", "en", "sr", "ollama", "m");

        storage.create_session(&session).await.unwrap();
        let err = storage.create_session(&session).await.unwrap_err();
        assert!(matches!(err, Error::SessionExists(id) if id == "s1"));
    }

    #[tokio::test]
    async fn test_average_duration_of_completed_sessions() {
        let temp_dir = TempDir::new().unwrap();
        let storage = create_test_storage(&temp_dir).await;

        let mut session = TranslationSession::new("s1", "Book", "en", "sr", "ollama", "m");
        session.status = SessionStatus::Completed;
        session.end_time = Some(session.start_time + chrono::Duration::seconds(90));
        storage.create_session(&session).await.unwrap();

        let stats = storage.statistics().await.unwrap();
        assert_eq!(stats.completed_sessions, 1);
        assert!((stats.average_duration_secs - 90.0).abs() < 0.01);
    }
}
