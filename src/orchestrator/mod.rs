//! Drives a whole document through a [`Translator`].
//!
//! The walk is strictly sequential and pre-order: metadata title and
//! description, then for each chapter its title followed by every section
//! (title, content, subsections). Progress is persisted through
//! [`SessionTracker`] and published on the [`EventBus`].

mod session;

pub use session::SessionTracker;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::document::{Document, Section};
use crate::error::{Error, Result};
use crate::events::{EventBus, EventType};
use crate::language::{LanguageDetector, UNKNOWN_LANGUAGE};
use crate::storage::{Storage, TranslationSession};
use crate::translator::{TranslationContext, TranslationStats, Translator, UnitKind};

/// Characters of extracted text handed to the language detector.
const DETECTION_SAMPLE_CHARS: usize = 2000;

/// Per-run settings for [`BookTranslator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Abort when the book title fails to translate.
    pub strict: bool,
    /// Source language; detected from the text when `None`.
    pub source_language: Option<String>,
    pub target_language: String,
    pub provider: String,
    pub model: String,
    pub input_file: String,
    pub output_file: String,
}

impl OrchestratorOptions {
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            strict: true,
            source_language: None,
            target_language: target_language.into(),
            provider: String::new(),
            model: String::new(),
            input_file: String::new(),
            output_file: String::new(),
        }
    }
}

type UnitFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Translates documents unit by unit and keeps their sessions up to date.
pub struct BookTranslator {
    translator: Arc<dyn Translator>,
    storage: Arc<dyn Storage>,
    detector: Option<Arc<dyn LanguageDetector>>,
    options: OrchestratorOptions,
}

/// What the walk needs besides the document itself.
struct Run<'r, 'a> {
    cancel: &'r CancellationToken,
    bus: &'r EventBus,
    context: TranslationContext,
    tracker: &'r mut SessionTracker<'a>,
}

impl BookTranslator {
    pub fn new(
        translator: Arc<dyn Translator>,
        storage: Arc<dyn Storage>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            translator,
            storage,
            detector: None,
            options,
        }
    }

    #[must_use]
    pub fn with_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub const fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn stats(&self) -> TranslationStats {
        self.translator.stats()
    }

    /// Translates `document` in place under session `session_id`.
    ///
    /// On success the session ends `completed` and `metadata.language` is
    /// the target language. On any hard error, cancellation included, the
    /// session ends `error` with its partial counters persisted and the
    /// error is returned.
    pub async fn translate_book(
        &self,
        cancel: &CancellationToken,
        document: &mut Document,
        bus: &EventBus,
        session_id: &str,
    ) -> Result<()> {
        if document.is_empty() {
            return Err(Error::InvalidDocument(
                "document has no title and no chapters".to_string(),
            ));
        }

        let mut fresh = TranslationSession::new(
            session_id,
            &document.metadata.title,
            self.options
                .source_language
                .as_deref()
                .unwrap_or(UNKNOWN_LANGUAGE),
            &self.options.target_language,
            &self.options.provider,
            &self.options.model,
        );
        fresh.input_file.clone_from(&self.options.input_file);
        fresh.output_file.clone_from(&self.options.output_file);

        let mut tracker = SessionTracker::open(self.storage.as_ref(), bus, fresh).await?;

        match self.run(cancel, document, bus, &mut tracker).await {
            Ok(()) => {
                tracker.complete().await?;
                Ok(())
            }
            Err(e) => {
                if let Err(persist) = tracker.fail(&e).await {
                    tracing::warn!(session_id, error = %persist, "failed to record session error");
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        document: &mut Document,
        bus: &EventBus,
        tracker: &mut SessionTracker<'_>,
    ) -> Result<()> {
        let source_language = self.resolve_source_language(cancel, document, tracker).await?;

        let total_chapters = u32::try_from(document.chapter_count()).unwrap_or(u32::MAX);
        tracker
            .start(&source_language, document.unit_count(), total_chapters)
            .await?;

        let context = TranslationContext::new(
            tracker.id(),
            source_language,
            &self.options.target_language,
        );
        let mut run = Run {
            cancel,
            bus,
            context,
            tracker,
        };

        self.translate_metadata(&mut run, document).await?;

        for (index, chapter) in document.chapters.iter_mut().enumerate() {
            let number = u32::try_from(index + 1).unwrap_or(u32::MAX);
            run.tracker.enter_chapter(number).await?;

            self.translate_unit(&mut run, &mut chapter.title, UnitKind::ChapterTitle)
                .await?;
            for section in &mut chapter.sections {
                self.translate_section(&mut run, section).await?;
            }
        }

        document
            .metadata
            .language
            .clone_from(&self.options.target_language);
        Ok(())
    }

    /// Configured source language, else detection, else `"unknown"`.
    async fn resolve_source_language(
        &self,
        cancel: &CancellationToken,
        document: &Document,
        tracker: &SessionTracker<'_>,
    ) -> Result<String> {
        if let Some(lang) = &self.options.source_language {
            return Ok(lang.clone());
        }
        let Some(detector) = &self.detector else {
            return Ok(UNKNOWN_LANGUAGE.to_string());
        };

        let text = document.extract_text();
        let sample = crate::document::sample(&text, DETECTION_SAMPLE_CHARS);

        match detector.detect_language(cancel, sample).await {
            Ok(code) => {
                tracing::info!(session_id = tracker.id(), language = %code, "detected source language");
                tracker.progress(format!("Detected language: {code}"));
                Ok(code)
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!(session_id = tracker.id(), error = %e, "language detection failed");
                tracker.progress(format!(
                    "Warning: language detection failed ({e}), continuing with '{UNKNOWN_LANGUAGE}'"
                ));
                Ok(UNKNOWN_LANGUAGE.to_string())
            }
        }
    }

    async fn translate_metadata(&self, run: &mut Run<'_, '_>, document: &mut Document) -> Result<()> {
        let title = self
            .translate_unit(run, &mut document.metadata.title, UnitKind::BookTitle)
            .await;
        if let Err(e) = title {
            if self.options.strict || !tolerable(&e) {
                return Err(e);
            }
            self.record_tolerated(run, "title", &e).await?;
        }

        let description = self
            .translate_unit(
                run,
                &mut document.metadata.description,
                UnitKind::BookDescription,
            )
            .await;
        if let Err(e) = description {
            if !tolerable(&e) {
                return Err(e);
            }
            self.record_tolerated(run, "description", &e).await?;
        }
        Ok(())
    }

    async fn record_tolerated(&self, run: &mut Run<'_, '_>, what: &str, error: &Error) -> Result<()> {
        tracing::warn!(session_id = run.tracker.id(), error = %error, "failed to translate {what}");
        run.tracker.unit_failed().await?;
        run.tracker
            .progress(format!("Warning: failed to translate {what}: {error}"));
        Ok(())
    }

    fn translate_section<'s>(
        &'s self,
        run: &'s mut Run<'_, '_>,
        section: &'s mut Section,
    ) -> UnitFuture<'s> {
        Box::pin(async move {
            self.translate_unit(run, &mut section.title, UnitKind::SectionTitle)
                .await?;
            self.translate_unit(run, &mut section.content, UnitKind::SectionContent)
                .await?;
            for sub in &mut section.subsections {
                self.translate_section(run, sub).await?;
            }
            Ok(())
        })
    }

    /// Translates one text in place. Empty texts are skipped.
    async fn translate_unit(
        &self,
        run: &mut Run<'_, '_>,
        text: &mut String,
        kind: UnitKind,
    ) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let context = run.context.with_kind(kind);
        tracing::debug!(
            session_id = %context.session_id,
            kind = %kind,
            chars = text.chars().count(),
            "translating unit"
        );

        let translated = self
            .translator
            .translate_with_progress(run.cancel, text, &context, run.bus, &context.session_id)
            .await?;
        *text = translated;
        run.tracker.unit_completed().await
    }
}

/// Failures a non-fatal unit may swallow. Cancellation and storage never are.
const fn tolerable(error: &Error) -> bool {
    !matches!(error, Error::Cancelled) && !error.is_storage()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::document::Chapter;
    use crate::storage::{MemoryStorage, SessionStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Uppercases everything, failing on texts listed in `fail_on`.
    #[derive(Default)]
    struct Scripted {
        fail_on: Vec<&'static str>,
        seen: Mutex<Vec<(UnitKind, String)>>,
    }

    #[async_trait]
    impl Translator for Scripted {
        async fn translate(
            &self,
            cancel: &CancellationToken,
            text: &str,
            context: &TranslationContext,
        ) -> Result<String> {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.seen
                .lock()
                .unwrap()
                .push((context.kind, text.to_string()));
            if self.fail_on.iter().any(|f| *f == text) {
                return Err(Error::Backend(format!("cannot translate {text}")));
            }
            Ok(text.to_uppercase())
        }

        fn stats(&self) -> TranslationStats {
            TranslationStats::default()
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn book() -> Document {
        let mut doc = Document::new("Book").with_chapter(
            Chapter::new("Chapter 1").with_section(
                Section::new("Intro", "Hello world")
                    .with_subsection(Section::new("", "Nested text")),
            ),
        );
        doc.metadata.description = "About".to_string();
        doc
    }

    fn orchestrator(
        translator: Arc<Scripted>,
        storage: Arc<MemoryStorage>,
        strict: bool,
    ) -> BookTranslator {
        let mut options = OrchestratorOptions::new("sr");
        options.source_language = Some("en".to_string());
        options.strict = strict;
        BookTranslator::new(translator, storage, options)
    }

    #[tokio::test]
    async fn test_empty_document_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let bt = orchestrator(Arc::new(Scripted::default()), storage.clone(), true);
        let err = bt
            .translate_book(
                &CancellationToken::new(),
                &mut Document::default(),
                &EventBus::new(),
                "s1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDocument(_)));
        assert!(storage.get_session("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_preorder_traversal() {
        let translator = Arc::new(Scripted::default());
        let storage = Arc::new(MemoryStorage::new());
        let bt = orchestrator(translator.clone(), storage.clone(), true);
        let mut doc = book();

        bt.translate_book(&CancellationToken::new(), &mut doc, &EventBus::new(), "s1")
            .await
            .unwrap();

        let seen: Vec<String> = translator
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect();
        assert_eq!(
            seen,
            ["Book", "About", "Chapter 1", "Intro", "Hello world", "Nested text"]
        );
        assert_eq!(doc.chapters[0].sections[0].subsections[0].content, "NESTED TEXT");
        assert_eq!(doc.metadata.language, "sr");

        let session = storage.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.items_total, 6);
        assert_eq!(session.items_completed, 6);
    }

    #[tokio::test]
    async fn test_description_failure_only_warns() {
        let translator = Arc::new(Scripted {
            fail_on: vec!["About"],
            ..Scripted::default()
        });
        let storage = Arc::new(MemoryStorage::new());
        let bt = orchestrator(translator, storage.clone(), true);
        let mut doc = book();

        bt.translate_book(&CancellationToken::new(), &mut doc, &EventBus::new(), "s1")
            .await
            .unwrap();

        assert_eq!(doc.metadata.description, "About");
        let session = storage.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.items_failed, 1);
        assert_eq!(session.items_completed, 5);
    }

    #[tokio::test]
    async fn test_title_failure_depends_on_strictness() {
        for strict in [true, false] {
            let translator = Arc::new(Scripted {
                fail_on: vec!["Book"],
                ..Scripted::default()
            });
            let storage = Arc::new(MemoryStorage::new());
            let bt = orchestrator(translator, storage.clone(), strict);
            let result = bt
                .translate_book(&CancellationToken::new(), &mut book(), &EventBus::new(), "s1")
                .await;

            let session = storage.get_session("s1").await.unwrap().unwrap();
            if strict {
                assert!(matches!(result, Err(Error::Backend(_))));
                assert_eq!(session.status, SessionStatus::Error);
            } else {
                assert!(result.is_ok());
                assert_eq!(session.status, SessionStatus::Completed);
            }
        }
    }

    #[tokio::test]
    async fn test_content_failure_aborts_with_partial_progress() {
        let translator = Arc::new(Scripted {
            fail_on: vec!["Hello world"],
            ..Scripted::default()
        });
        let storage = Arc::new(MemoryStorage::new());
        let bt = orchestrator(translator.clone(), storage.clone(), false);

        let err = bt
            .translate_book(&CancellationToken::new(), &mut book(), &EventBus::new(), "s1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(_)));

        let session = storage.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Error);
        assert_eq!(session.items_completed, 4);
        assert!(session.error_message.unwrap().contains("Hello world"));
        // Nothing after the failing unit was attempted.
        assert_eq!(translator.seen.lock().unwrap().len(), 5);
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl LanguageDetector for Fixed {
        async fn detect_language(&self, _: &CancellationToken, _: &str) -> Result<String> {
            if self.0.is_empty() {
                Err(Error::LanguageDetection("no idea".into()))
            } else {
                Ok(self.0.to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_detected_language_is_recorded() {
        let storage = Arc::new(MemoryStorage::new());
        let bt = BookTranslator::new(
            Arc::new(Scripted::default()),
            storage.clone(),
            OrchestratorOptions::new("sr"),
        )
        .with_detector(Arc::new(Fixed("en")));

        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bt.translate_book(&CancellationToken::new(), &mut book(), &bus, "s1")
            .await
            .unwrap();

        let session = storage.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.source_language, "en");

        let mut messages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            messages.push(event.message);
        }
        assert!(messages.iter().any(|m| m == "Detected language: en"));
    }

    #[tokio::test]
    async fn test_detection_failure_continues_as_unknown() {
        let storage = Arc::new(MemoryStorage::new());
        let bt = BookTranslator::new(
            Arc::new(Scripted::default()),
            storage.clone(),
            OrchestratorOptions::new("sr"),
        )
        .with_detector(Arc::new(Fixed("")));

        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bt.translate_book(&CancellationToken::new(), &mut book(), &bus, "s1")
            .await
            .unwrap();

        let session = storage.get_session("s1").await.unwrap().unwrap();
        assert_eq!(session.source_language, UNKNOWN_LANGUAGE);
        assert_eq!(session.status, SessionStatus::Completed);

        let mut warnings = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if event.event_type == EventType::Progress
                && event.message.starts_with("Warning: language detection failed")
            {
                warnings.push(event.message);
            }
        }
        assert_eq!(warnings.len(), 1, "expected one detection warning");
        assert!(warnings[0].contains(UNKNOWN_LANGUAGE));
    }
}
