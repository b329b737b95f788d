use chrono::Utc;

use crate::error::{Error, Result};
use crate::events::{Event, EventBus, EventData, EventType};
use crate::storage::{SessionStatus, Storage, TranslationSession};

/// Keeps a [`TranslationSession`] in step with a running translation.
///
/// Every state change is persisted before the matching event goes out, so a
/// subscriber that reloads the session never sees it behind the events.
pub struct SessionTracker<'a> {
    storage: &'a dyn Storage,
    bus: &'a EventBus,
    session: TranslationSession,
}

impl<'a> SessionTracker<'a> {
    /// Loads the session `fresh.id`, creating it from `fresh` when missing.
    ///
    /// A stored session that already finished is refused before any event
    /// is published.
    pub async fn open(
        storage: &'a dyn Storage,
        bus: &'a EventBus,
        fresh: TranslationSession,
    ) -> Result<Self> {
        let session = match storage.get_session(&fresh.id).await? {
            Some(existing) => existing,
            None => {
                storage.create_session(&fresh).await?;
                fresh
            }
        };

        if session.status.is_terminal() {
            return Err(Error::InvalidTransition {
                from: session.status.to_string(),
                to: SessionStatus::Translating.to_string(),
            });
        }

        tracing::info!(session_id = %session.id, title = %session.title, "session opened");
        bus.publish(Event::new(
            EventType::Started,
            &session.id,
            format!("Translation started: {}", session.title),
            EventData::default(),
        ));

        Ok(Self {
            storage,
            bus,
            session,
        })
    }

    pub const fn session(&self) -> &TranslationSession {
        &self.session
    }

    pub fn id(&self) -> &str {
        &self.session.id
    }

    /// Moves to `translating` with the unit and chapter totals fixed.
    pub async fn start(
        &mut self,
        source_language: &str,
        items_total: u64,
        total_chapters: u32,
    ) -> Result<()> {
        self.session.transition(SessionStatus::Translating)?;
        self.session.source_language = source_language.to_string();
        self.session.items_total = items_total;
        self.session.items_completed = 0;
        self.session.items_failed = 0;
        self.session.total_chapters = total_chapters;
        self.session.current_chapter = 0;
        self.session.progress = 0.0;
        self.persist().await?;

        self.progress(format!(
            "Translating {items_total} items in {total_chapters} chapters"
        ));
        Ok(())
    }

    /// Records that chapter `chapter` (1-based) is being translated.
    pub async fn enter_chapter(&mut self, chapter: u32) -> Result<()> {
        self.session.current_chapter = chapter;
        self.persist().await?;
        self.progress(format!(
            "Translating chapter {chapter}/{}",
            self.session.total_chapters
        ));
        Ok(())
    }

    pub async fn unit_completed(&mut self) -> Result<()> {
        self.session.items_completed += 1;
        self.session.progress = percent(self.session.items_completed, self.session.items_total);
        self.persist().await?;
        self.progress(format!(
            "{}/{} items translated",
            self.session.items_completed, self.session.items_total
        ));
        Ok(())
    }

    pub async fn unit_failed(&mut self) -> Result<()> {
        self.session.items_failed += 1;
        self.persist().await
    }

    /// Publishes a progress event carrying the current counters.
    pub fn progress(&self, message: impl Into<String>) {
        self.bus
            .emit_progress(&self.session.id, message, self.event_data());
    }

    /// Marks the session `completed` and returns its final state.
    pub async fn complete(mut self) -> Result<TranslationSession> {
        self.session.transition(SessionStatus::Completed)?;
        self.persist().await?;

        tracing::info!(
            session_id = %self.session.id,
            items = self.session.items_completed,
            failed = self.session.items_failed,
            "session completed"
        );
        self.bus.publish(Event::new(
            EventType::Completed,
            &self.session.id,
            "Translation completed",
            self.event_data(),
        ));
        Ok(self.session)
    }

    /// Marks the session `error`, keeping whatever progress was made.
    pub async fn fail(mut self, error: &Error) -> Result<TranslationSession> {
        self.session.error_message = Some(error.to_string());
        self.session.transition(SessionStatus::Error)?;
        self.persist().await?;

        tracing::info!(session_id = %self.session.id, error = %error, "session failed");
        self.bus
            .emit_error(&self.session.id, "Translation failed", error);
        Ok(self.session)
    }

    async fn persist(&mut self) -> Result<()> {
        self.session.updated_at = Utc::now();
        self.storage.update_session(&self.session).await
    }

    fn event_data(&self) -> EventData {
        EventData {
            chapter: (self.session.current_chapter > 0).then_some(self.session.current_chapter),
            total_chapters: Some(self.session.total_chapters),
            progress: Some(self.session.progress),
            items_completed: Some(self.session.items_completed),
            items_total: Some(self.session.items_total),
            error: None,
        }
    }
}

fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (done.min(total) as f64 / total as f64) * 100.0
}
