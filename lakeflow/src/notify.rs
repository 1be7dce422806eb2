//! Best-effort notification dispatch.
//!
//! Publish failures are logged and swallowed: a run's outcome never
//! depends on whether the announcement about it went out.

use std::sync::Arc;

use crate::clients::NotificationChannel;

/// Publishes run announcements to a fixed topic.
pub struct Notifier {
    channel: Arc<dyn NotificationChannel>,
    topic: String,
}

impl Notifier {
    /// Creates a notifier bound to a topic.
    #[must_use]
    pub fn new(channel: Arc<dyn NotificationChannel>, topic: impl Into<String>) -> Self {
        Self {
            channel,
            topic: topic.into(),
        }
    }

    /// Publishes a message, best-effort.
    ///
    /// Returns whether the publish went through; callers are free to
    /// ignore the result.
    pub async fn publish(&self, subject: &str, message: &str) -> bool {
        match self.channel.publish(&self.topic, subject, message).await {
            Ok(()) => {
                tracing::info!(topic = %self.topic, subject, "notification published");
                true
            }
            Err(err) => {
                tracing::warn!(
                    topic = %self.topic,
                    subject,
                    error = %err,
                    "notification publish failed; continuing"
                );
                false
            }
        }
    }
}
