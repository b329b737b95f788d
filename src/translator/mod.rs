//! Pluggable translators and the LLM backends behind them.
//!
//! [`Translator`] is what the orchestrator calls. [`ManagedTranslator`] is the
//! standard implementation: it admits each call through the rate limiter,
//! answers from the cache when it can, and otherwise asks an [`LlmBackend`].

mod client;
mod managed;
mod prompt;
mod sse_parser;

pub use client::OpenAiCompatibleBackend;
pub use managed::ManagedTranslator;
pub use prompt::{DETECTION_PROMPT, SYSTEM_PROMPT_TEMPLATE, build_system_prompt};

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::events::{EventBus, EventData};

/// Which part of the document a text comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    BookTitle,
    BookDescription,
    ChapterTitle,
    SectionTitle,
    SectionContent,
}

impl UnitKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BookTitle => "book title",
            Self::BookDescription => "book description",
            Self::ChapterTitle => "chapter title",
            Self::SectionTitle => "section title",
            Self::SectionContent => "section content",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything about a call except the text itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationContext {
    /// Rate-limit key; also the session the call belongs to.
    pub session_id: String,
    /// ISO 639-1 code, or `"unknown"`.
    pub source_language: String,
    pub target_language: String,
    pub kind: UnitKind,
}

impl TranslationContext {
    pub fn new(
        session_id: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            kind: UnitKind::SectionContent,
        }
    }

    #[must_use]
    pub fn with_kind(&self, kind: UnitKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }
}

/// Counters reported by [`Translator::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TranslationStats {
    pub total: u64,
    pub translated: u64,
    pub cached: u64,
    pub errors: u64,
    /// Translations returned to the caller but not written to the cache.
    pub cache_write_errors: u64,
}

/// Lock-free counters behind [`TranslationStats`].
#[derive(Debug, Default)]
pub struct StatsCounter {
    total: AtomicU64,
    translated: AtomicU64,
    cached: AtomicU64,
    errors: AtomicU64,
    cache_write_errors: AtomicU64,
}

impl StatsCounter {
    pub fn record_request(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_translated(&self) {
        self.translated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cached(&self) {
        self.cached.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_write_error(&self) {
        self.cache_write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TranslationStats {
        TranslationStats {
            total: self.total.load(Ordering::Relaxed),
            translated: self.translated.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cache_write_errors: self.cache_write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Translates one text at a time.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        cancel: &CancellationToken,
        text: &str,
        context: &TranslationContext,
    ) -> Result<String>;

    /// Like [`Translator::translate`], announcing the call on `bus` first.
    async fn translate_with_progress(
        &self,
        cancel: &CancellationToken,
        text: &str,
        context: &TranslationContext,
        bus: &EventBus,
        session_id: &str,
    ) -> Result<String> {
        bus.emit_progress(
            session_id,
            format!("Translating {}", context.kind),
            EventData::default(),
        );
        self.translate(cancel, text, context).await
    }

    fn stats(&self) -> TranslationStats;

    fn name(&self) -> &str;
}

/// A single prompt for an LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    pub system_prompt: String,
    pub text: String,
}

/// A concrete LLM endpoint.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Returns the full completion for `request`.
    async fn complete(&self, cancel: &CancellationToken, request: &BackendRequest)
    -> Result<String>;

    /// Provider name, part of the cache key.
    fn provider(&self) -> &str;

    /// Model name, part of the cache key.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_with_kind_keeps_languages() {
        let base = TranslationContext::new("s1", "en", "sr");
        let title = base.with_kind(UnitKind::ChapterTitle);
        assert_eq!(title.kind, UnitKind::ChapterTitle);
        assert_eq!(title.target_language, "sr");
        assert_eq!(base.kind, UnitKind::SectionContent);
    }

    #[test]
    fn test_stats_counter_snapshot() {
        let counter = StatsCounter::default();
        counter.record_request();
        counter.record_request();
        counter.record_cached();
        counter.record_error();
        counter.record_cache_write_error();
        assert_eq!(
            counter.snapshot(),
            TranslationStats {
                total: 2,
                translated: 0,
                cached: 1,
                errors: 1,
                cache_write_errors: 1,
            }
        );
    }
}
