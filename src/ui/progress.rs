use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::events::{Event, EventBus, EventType};

const TEMPLATE: &str = "{bar:40.cyan/blue} {pos:>3}% {msg}";

/// Renders a session's events as a progress bar on stderr.
pub struct ProgressReporter {
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Subscribes to `bus` and follows `session_id` until it completes or fails.
    pub fn spawn(bus: &EventBus, session_id: &str) -> Self {
        let bar = if crate::output::is_quiet() {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(100);
            if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        };

        let rx = bus.subscribe();
        let session_id = session_id.to_string();
        let handle = tokio::spawn(follow(rx, bar, session_id));
        Self { handle }
    }

    /// Waits for the bar to finish drawing.
    pub async fn finish(self) {
        if let Err(e) = self.handle.await {
            tracing::debug!(error = %e, "progress reporter task failed");
        }
    }
}

async fn follow(mut rx: broadcast::Receiver<Event>, bar: ProgressBar, session_id: String) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "progress reporter lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if event.session_id != session_id {
            continue;
        }

        if let Some(percent) = event.data.progress {
            bar.set_position(percent.clamp(0.0, 100.0).round() as u64);
        }
        match event.event_type {
            EventType::Started | EventType::Progress => bar.set_message(event.message),
            EventType::Completed => {
                bar.set_position(100);
                bar.finish_with_message(event.message);
                break;
            }
            EventType::Error => {
                bar.abandon_with_message(event.message);
                break;
            }
        }
    }
}
