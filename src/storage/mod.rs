//! Session persistence and the translation cache.
//!
//! Every backend implements [`Storage`]. Callers hold an `Arc<dyn Storage>`
//! picked once from [`StorageConfig`] by [`open`].

mod memory;
mod redis;
mod sqlite;

pub use memory::MemoryStorage;
pub use self::redis::RedisStorage;
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

/// Lifecycle state of a [`TranslationSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Initializing,
    Translating,
    Completed,
    Error,
}

impl SessionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Translating => "translating",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// `completed` and `error` never change again.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "initializing" => Ok(Self::Initializing),
            "translating" => Ok(Self::Translating),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(Error::Storage(format!("unknown session status '{other}'"))),
        }
    }
}

/// Persistent record of one document translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationSession {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub input_file: String,
    #[serde(default)]
    pub output_file: String,
    pub source_language: String,
    pub target_language: String,
    pub provider: String,
    pub model: String,
    pub status: SessionStatus,
    /// Percent complete, 0 to 100.
    pub progress: f64,
    pub current_chapter: u32,
    pub total_chapters: u32,
    pub items_total: u64,
    pub items_completed: u64,
    pub items_failed: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranslationSession {
    /// A fresh session in the `initializing` state.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            input_file: String::new(),
            output_file: String::new(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            provider: provider.into(),
            model: model.into(),
            status: SessionStatus::Initializing,
            progress: 0.0,
            current_chapter: 0,
            total_chapters: 0,
            items_total: 0,
            items_completed: 0,
            items_failed: 0,
            start_time: now,
            end_time: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next`, refusing to leave a terminal state.
    pub fn transition(&mut self, next: SessionStatus) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        self.status = next;
        match next {
            SessionStatus::Completed => {
                self.progress = 100.0;
                self.end_time = Some(Utc::now());
            }
            SessionStatus::Error => self.end_time = Some(Utc::now()),
            SessionStatus::Initializing | SessionStatus::Translating => {}
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Wall-clock duration of a finished session.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

/// The five values a cached translation is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub source_text: String,
    pub source_language: String,
    pub target_language: String,
    pub provider: String,
    pub model: String,
}

impl CacheKey {
    pub fn new(
        source_text: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            source_text: source_text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Hex SHA-256 of the key's canonical JSON form.
    pub fn digest(&self) -> String {
        let input = serde_json::json!({
            "source_text": self.source_text,
            "source_language": self.source_language,
            "target_language": self.target_language,
            "provider": self.provider,
            "model": self.model,
        });

        let mut hasher = Sha256::new();
        hasher.update(input.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A stored translation plus its access metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationCacheEntry {
    #[serde(flatten)]
    pub key: CacheKey,
    pub target_text: String,
    pub access_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl TranslationCacheEntry {
    /// New entry; the miss that produced it counts as its first access.
    pub fn new(key: CacheKey, target_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key,
            target_text: target_text.into(),
            access_count: 1,
            created_at: now,
            last_accessed_at: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = Utc::now();
    }
}

/// Aggregate numbers for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    pub failed_sessions: u64,
    pub in_progress_sessions: u64,
    pub total_translations: u64,
    /// Estimated percentage of lookups served from cache.
    pub cache_hit_rate: f64,
    /// Mean duration of completed sessions, in seconds.
    pub average_duration_secs: f64,
}

/// Hit-rate estimate from summed access counts.
///
/// Each entry's first access is assumed to be the miss that created it.
pub(crate) fn estimate_hit_rate(total_accesses: u64, entries: u64) -> f64 {
    if total_accesses == 0 {
        return 0.0;
    }
    total_accesses.saturating_sub(entries) as f64 / total_accesses as f64 * 100.0
}

/// Oldest `last_accessed_at` a cache entry may have to survive a cleanup.
///
/// `None` when the window reaches past the representable time range, in
/// which case no entry is old enough to remove.
pub(crate) fn cleanup_cutoff(older_than: Duration) -> Option<DateTime<Utc>> {
    let window = chrono::Duration::from_std(older_than).ok()?;
    Utc::now().checked_sub_signed(window)
}

/// Session and cache persistence.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stores a new session. Fails with [`Error::SessionExists`] on a duplicate id.
    async fn create_session(&self, session: &TranslationSession) -> Result<()>;

    async fn get_session(&self, id: &str) -> Result<Option<TranslationSession>>;

    /// Replaces a stored session. Fails with [`Error::SessionNotFound`] if absent.
    async fn update_session(&self, session: &TranslationSession) -> Result<()>;

    async fn delete_session(&self, id: &str) -> Result<()>;

    /// Sessions ordered newest first.
    async fn list_sessions(&self, limit: usize, offset: usize) -> Result<Vec<TranslationSession>>;

    /// Exact-match lookup. A hit increments `access_count` and the returned
    /// entry carries the new count.
    async fn get_cached_translation(&self, key: &CacheKey)
    -> Result<Option<TranslationCacheEntry>>;

    /// Inserts or replaces the entry for `entry.key`.
    async fn cache_translation(&self, entry: &TranslationCacheEntry) -> Result<()>;

    /// Drops entries not accessed within `older_than`. Returns how many were removed.
    async fn cleanup_old_cache(&self, older_than: Duration) -> Result<usize>;

    async fn statistics(&self) -> Result<Statistics>;

    async fn ping(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Which backend [`open`] builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    Sqlite,
    Redis,
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "redis" => Ok(Self::Redis),
            other => Err(Error::Config(format!(
                "unknown storage backend '{other}' (expected memory, sqlite or redis)"
            ))),
        }
    }
}

/// Default lifetime of Redis keys: one week.
pub const DEFAULT_TTL_SECS: u64 = 7 * 24 * 60 * 60;

const fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

/// The `[storage]` section of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// `SQLite` database file.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            redis_url: None,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

/// Builds the configured backend.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        StorageBackend::Sqlite => {
            let path = config.path.clone().ok_or_else(|| {
                Error::Config("sqlite storage requires [storage] path".to_string())
            })?;
            Arc::new(SqliteStorage::open(path).await?)
        }
        StorageBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                Error::Config("redis storage requires [storage] redis_url".to_string())
            })?;
            Arc::new(RedisStorage::connect(url, Duration::from_secs(config.ttl_secs)).await?)
        }
    };

    tracing::debug!(backend = ?config.backend, "storage opened");
    Ok(storage)
}
