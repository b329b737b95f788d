use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::prompt::build_system_prompt;
use super::{
    BackendRequest, LlmBackend, StatsCounter, TranslationContext, TranslationStats, Translator,
};
use crate::error::{Error, Result};
use crate::ratelimit::RateLimiter;
use crate::storage::{CacheKey, Storage, TranslationCacheEntry};

/// Rate limiter, then cache, then backend.
///
/// Every call waits for a token keyed by the session id. A cache hit
/// returns the stored text without touching the backend; a miss is sent to
/// the backend and the result is written back.
pub struct ManagedTranslator {
    backend: Arc<dyn LlmBackend>,
    limiter: Arc<RateLimiter>,
    storage: Arc<dyn Storage>,
    stats: StatsCounter,
}

impl ManagedTranslator {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        limiter: Arc<RateLimiter>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            backend,
            limiter,
            storage,
            stats: StatsCounter::default(),
        }
    }

    fn cache_key(&self, text: &str, context: &TranslationContext) -> CacheKey {
        CacheKey::new(
            text,
            &context.source_language,
            &context.target_language,
            self.backend.provider(),
            self.backend.model(),
        )
    }

    async fn translate_uncounted(
        &self,
        cancel: &CancellationToken,
        text: &str,
        context: &TranslationContext,
    ) -> Result<String> {
        self.limiter.wait(&context.session_id, cancel).await?;

        let key = self.cache_key(text, context);
        if let Some(entry) = cancellable(cancel, self.storage.get_cached_translation(&key)).await? {
            tracing::debug!(
                session_id = %context.session_id,
                kind = %context.kind,
                access_count = entry.access_count,
                "cache hit"
            );
            self.stats.record_cached();
            return Ok(entry.target_text);
        }

        let request = BackendRequest {
            system_prompt: build_system_prompt(
                &context.source_language,
                &context.target_language,
                context.kind,
            ),
            text: text.to_string(),
        };
        let translated = self.backend.complete(cancel, &request).await?;

        let entry = TranslationCacheEntry::new(key, translated.clone());
        if let Err(e) = cancellable(cancel, self.storage.cache_translation(&entry)).await {
            if matches!(e, Error::Cancelled) {
                return Err(e);
            }
            self.stats.record_cache_write_error();
            tracing::warn!(
                session_id = %context.session_id,
                error = %e,
                "failed to cache translation"
            );
        }

        self.stats.record_translated();
        Ok(translated)
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

#[async_trait]
impl Translator for ManagedTranslator {
    async fn translate(
        &self,
        cancel: &CancellationToken,
        text: &str,
        context: &TranslationContext,
    ) -> Result<String> {
        self.stats.record_request();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let result = self.translate_uncounted(cancel, text, context).await;
        if let Err(e) = &result {
            self.stats.record_error();
            tracing::debug!(session_id = %context.session_id, error = %e, "translation failed");
        }
        result
    }

    fn stats(&self) -> TranslationStats {
        self.stats.snapshot()
    }

    fn name(&self) -> &str {
        self.backend.provider()
    }
}
