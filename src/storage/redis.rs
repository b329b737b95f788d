use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use std::time::Duration;

use super::{
    CacheKey, SessionStatus, Statistics, Storage, TranslationCacheEntry, TranslationSession,
    estimate_hit_rate,
};
use crate::error::{Error, Result};

const SESSION_PREFIX: &str = "session:";
const CACHE_PREFIX: &str = "cache:";

fn session_key(id: &str) -> String {
    format!("{SESSION_PREFIX}{id}")
}

fn cache_key(key: &CacheKey) -> String {
    format!("{CACHE_PREFIX}{}", key.digest())
}

/// Redis-backed storage.
///
/// Sessions are JSON strings. Cache entries are hashes with the JSON entry in
/// `data` and a separate `access_count` counter so hits increment atomically.
/// Every key expires after the configured TTL, so there is no explicit sweep.
#[derive(Clone)]
pub struct RedisStorage {
    conn: MultiplexedConnection,
    ttl_secs: u64,
}

impl std::fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorage")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl RedisStorage {
    /// Connects to `url` and checks the server answers.
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        let storage = Self {
            conn,
            ttl_secs: ttl.as_secs().max(1),
        };
        storage.ping().await?;
        tracing::debug!(ttl_secs = storage.ttl_secs, "redis storage connected");
        Ok(storage)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn load_sessions(&self) -> Result<Vec<TranslationSession>> {
        let keys = self.scan_keys(&format!("{SESSION_PREFIX}*")).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        values
            .into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(Error::from))
            .collect()
    }

    async fn write_session(&self, session: &TranslationSession, mode: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(session)?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(session_key(&session.id))
            .arg(json)
            .arg(mode)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn create_session(&self, session: &TranslationSession) -> Result<()> {
        if self.write_session(session, "NX").await? {
            Ok(())
        } else {
            Err(Error::SessionExists(session.id.clone()))
        }
    }

    async fn get_session(&self, id: &str) -> Result<Option<TranslationSession>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = redis::cmd("GET")
            .arg(session_key(id))
            .query_async(&mut conn)
            .await?;
        json.map(|j| serde_json::from_str(&j).map_err(Error::from))
            .transpose()
    }

    async fn update_session(&self, session: &TranslationSession) -> Result<()> {
        let mut updated = session.clone();
        updated.updated_at = Utc::now();
        if self.write_session(&updated, "XX").await? {
            Ok(())
        } else {
            Err(Error::SessionNotFound(session.id.clone()))
        }
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(session_key(id))
            .query_async(&mut conn)
            .await?;
        if removed == 0 {
            Err(Error::SessionNotFound(id.to_string()))
        } else {
            Ok(())
        }
    }

    async fn list_sessions(&self, limit: usize, offset: usize) -> Result<Vec<TranslationSession>> {
        let mut sessions = self.load_sessions().await?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sessions.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_cached_translation(
        &self,
        key: &CacheKey,
    ) -> Result<Option<TranslationCacheEntry>> {
        let redis_key = cache_key(key);
        let mut conn = self.conn.clone();

        let data: Option<String> = redis::cmd("HGET")
            .arg(&redis_key)
            .arg("data")
            .query_async(&mut conn)
            .await?;
        let Some(data) = data else {
            return Ok(None);
        };

        let mut entry: TranslationCacheEntry = serde_json::from_str(&data)?;
        if entry.key != *key {
            return Ok(None);
        }

        let now = Utc::now();
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("HINCRBY")
            .arg(&redis_key)
            .arg("access_count")
            .arg(1)
            .cmd("HSET")
            .arg(&redis_key)
            .arg("last_accessed_at")
            .arg(now.timestamp_millis())
            .ignore()
            .cmd("EXPIRE")
            .arg(&redis_key)
            .arg(self.ttl_secs)
            .ignore()
            .query_async(&mut conn)
            .await?;

        entry.access_count = count;
        entry.last_accessed_at = now;
        Ok(Some(entry))
    }

    async fn cache_translation(&self, entry: &TranslationCacheEntry) -> Result<()> {
        let redis_key = cache_key(&entry.key);
        let json = serde_json::to_string(entry)?;
        let mut conn = self.conn.clone();

        let () = redis::pipe()
            .atomic()
            .cmd("DEL")
            .arg(&redis_key)
            .ignore()
            .cmd("HSET")
            .arg(&redis_key)
            .arg("data")
            .arg(json)
            .arg("access_count")
            .arg(entry.access_count)
            .arg("last_accessed_at")
            .arg(entry.last_accessed_at.timestamp_millis())
            .ignore()
            .cmd("EXPIRE")
            .arg(&redis_key)
            .arg(self.ttl_secs)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn cleanup_old_cache(&self, _older_than: Duration) -> Result<usize> {
        // Keys carry a TTL; Redis expires them itself.
        Ok(0)
    }

    async fn statistics(&self) -> Result<Statistics> {
        let mut stats = Statistics::default();
        let mut total_secs = 0.0;
        let mut timed = 0u64;

        for session in self.load_sessions().await? {
            stats.total_sessions += 1;
            match session.status {
                SessionStatus::Completed => {
                    stats.completed_sessions += 1;
                    if let Some(duration) = session.duration() {
                        total_secs += duration.num_milliseconds() as f64 / 1000.0;
                        timed += 1;
                    }
                }
                SessionStatus::Error => stats.failed_sessions += 1,
                SessionStatus::Translating => stats.in_progress_sessions += 1,
                SessionStatus::Initializing => {}
            }
        }
        if timed > 0 {
            stats.average_duration_secs = total_secs / timed as f64;
        }

        let keys = self.scan_keys(&format!("{CACHE_PREFIX}*")).await?;
        let mut accesses = 0u64;
        if !keys.is_empty() {
            let mut pipe = redis::pipe();
            for key in &keys {
                pipe.cmd("HGET").arg(key).arg("access_count");
            }
            let mut conn = self.conn.clone();
            let counts: Vec<Option<u64>> = pipe.query_async(&mut conn).await?;
            accesses = counts.into_iter().flatten().sum();
        }

        stats.total_translations = keys.len() as u64;
        stats.cache_hit_rate = estimate_hit_rate(accesses, stats.total_translations);
        Ok(stats)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(Error::Storage(format!("unexpected PING reply: {reply}")))
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
