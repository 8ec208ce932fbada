//! Channel that writes notifications to the tracing log.

use crate::traits::{Notification, Notifier, NotifyError};

/// Logs each notification at `info`. Used when no delivery channel is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            user_id = %notification.user_id,
            priority = ?notification.priority,
            action = notification.action_ref.as_deref().unwrap_or("-"),
            title = %notification.title,
            "notification"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
