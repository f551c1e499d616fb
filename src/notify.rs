//! End-of-cycle notifications
//!
//! The engine decides what to say; a [`Notifier`] decides how. Delivery is
//! fire-and-forget: failures are logged by the engine and otherwise ignored.

use std::sync::Mutex;

use anyhow::Result;

use crate::cycle::kind::CycleType;

/// Notification delivery collaborator
pub trait Notifier: Send + Sync {
    /// Show a notification
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// A title/body pair chosen by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Headline
    pub title: String,
    /// Detail line
    pub body: String,
}

impl Message {
    fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
        }
    }

    /// Message for a finished cycle, given the phase that comes next
    #[must_use]
    pub fn cycle_finished(finished: CycleType, next: CycleType) -> Self {
        match (finished, next) {
            (CycleType::Focus, CycleType::LongBreak) => Self::new(
                "Focus time complete!",
                "You've earned a long break. Rest well and come back recharged.",
            ),
            (CycleType::Focus, _) => Self::new(
                "Focus time complete!",
                "Time for a short break. Breathe, stretch, and get ready for the next cycle.",
            ),
            (CycleType::LongBreak, _) => Self::new(
                "Long break over!",
                "Back to focus. You're ready for the next challenge.",
            ),
            (CycleType::ShortBreak, _) => {
                Self::new("Short break over!", "Back to focus. Keep the momentum.")
            }
        }
    }

    /// Message for a challenge reaching its planned cycles
    #[must_use]
    pub fn challenge_completed(title: &str) -> Self {
        Self {
            title: "Congratulations! 🎉".to_string(),
            body: format!("You completed the challenge \"{title}\"!"),
        }
    }
}

/// Writes notifications to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        tracing::info!(title, body, "notification");
        Ok(())
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<Message>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far, oldest first
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(Message::new(title, body));
        }
        Ok(())
    }
}
