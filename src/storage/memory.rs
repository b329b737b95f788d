use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{
    CacheKey, SessionStatus, Statistics, Storage, TranslationCacheEntry, TranslationSession,
    cleanup_cutoff, estimate_hit_rate,
};
use crate::error::{Error, Result};

/// In-process storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    sessions: RwLock<HashMap<String, TranslationSession>>,
    cache: RwLock<HashMap<CacheKey, TranslationCacheEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_session(&self, session: &TranslationSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(Error::SessionExists(session.id.clone()));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<TranslationSession>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn update_session(&self, session: &TranslationSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get_mut(&session.id)
            .ok_or_else(|| Error::SessionNotFound(session.id.clone()))?;
        *stored = session.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    async fn list_sessions(&self, limit: usize, offset: usize) -> Result<Vec<TranslationSession>> {
        let sessions = self.sessions.read().await;
        let mut all: Vec<_> = sessions.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_cached_translation(
        &self,
        key: &CacheKey,
    ) -> Result<Option<TranslationCacheEntry>> {
        let mut cache = self.cache.write().await;
        Ok(cache.get_mut(key).map(|entry| {
            entry.touch();
            entry.clone()
        }))
    }

    async fn cache_translation(&self, entry: &TranslationCacheEntry) -> Result<()> {
        self.cache
            .write()
            .await
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn cleanup_old_cache(&self, older_than: Duration) -> Result<usize> {
        let Some(cutoff) = cleanup_cutoff(older_than) else {
            return Ok(0);
        };

        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, entry| entry.last_accessed_at >= cutoff);
        Ok(before - cache.len())
    }

    async fn statistics(&self) -> Result<Statistics> {
        let mut stats = Statistics::default();
        let mut total_secs = 0.0;
        let mut timed = 0u64;

        for session in self.sessions.read().await.values() {
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

        let cache = self.cache.read().await;
        let accesses: u64 = cache.values().map(|e| e.access_count).sum();
        stats.total_translations = cache.len() as u64;
        stats.cache_hit_rate = estimate_hit_rate(accesses, stats.total_translations);

        Ok(stats)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
