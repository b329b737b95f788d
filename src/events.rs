//! Progress events and the bus that fans them out.
//!
//! The orchestrator publishes; CLIs, servers and tests subscribe. Publishing
//! with no subscriber is not an error, and a slow subscriber only loses its
//! own backlog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Started,
    Progress,
    Completed,
    Error,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Started => "started",
            Self::Progress => "progress",
            Self::Completed => "completed",
            Self::Error => "error",
        })
    }
}

/// Structured payload. Fields are filled in where they apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chapters: Option<u32>,
    /// Percent complete at the time of the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_completed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub data: EventData,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(
        event_type: EventType,
        session_id: impl Into<String>,
        message: impl Into<String>,
        data: EventData,
    ) -> Self {
        Self {
            event_type,
            session_id: session_id.into(),
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast channel of [`Event`]s. Clones share the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` is the per-subscriber backlog before old events are dropped.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn publish(&self, event: Event) {
        tracing::trace!(
            event_type = %event.event_type,
            session_id = %event.session_id,
            message = %event.message,
            "event"
        );
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn emit_progress(&self, session_id: &str, message: impl Into<String>, data: EventData) {
        self.publish(Event::new(EventType::Progress, session_id, message, data));
    }

    pub fn emit_error(&self, session_id: &str, message: impl Into<String>, error: &dyn fmt::Display) {
        let data = EventData {
            error: Some(error.to_string()),
            ..EventData::default()
        };
        self.publish(Event::new(EventType::Error, session_id, message, data));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.emit_progress("s1", "nobody listening", EventData::default());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_see_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit_progress("s1", "first", EventData::default());
        bus.emit_error("s1", "second", &"boom");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event_type, EventType::Progress);
        assert_eq!(first.message, "first");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.event_type, EventType::Error);
        assert_eq!(second.data.error.as_deref(), Some("boom"));
        assert_eq!(second.session_id, "s1");
    }

    #[test]
    fn test_event_json_omits_empty_fields() {
        let event = Event::new(
            EventType::Progress,
            "s1",
            "Translating chapter 1/2",
            EventData {
                chapter: Some(1),
                total_chapters: Some(2),
                ..EventData::default()
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "progress");
        assert_eq!(json["data"]["chapter"], 1);
        assert!(json["data"].get("error").is_none());
    }
}
