//! Routes notifications to configured channels.
//!
//! The dispatcher delivers a notification to every configured channel.
//! Individual channel failures don't block other channels, and callers
//! using [`Dispatcher::notify`] never see delivery errors at all.

use std::sync::Arc;

use crate::traits::{DispatchResult, Notification, Notifier};

/// Fans a notification out to a shared set of channels.
pub struct Dispatcher {
    channels: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    /// Create a dispatcher over the given channels.
    pub fn new(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Create an empty dispatcher (drops every notification).
    pub fn empty() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    pub fn add_channel(&mut self, channel: Arc<dyn Notifier>) {
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver a notification to all channels and wait for the outcome.
    ///
    /// Returns results for each channel delivery. Individual failures
    /// don't block other channels.
    pub async fn dispatch(&self, notification: &Notification) -> Vec<DispatchResult> {
        if self.channels.is_empty() {
            tracing::debug!(user_id = %notification.user_id, "No notification channels configured");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let start = std::time::Instant::now();
            let result = channel.send(notification).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::debug!(
                        user_id = %notification.user_id,
                        channel = channel.channel_name(),
                        duration_ms,
                        "Notification delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = %notification.user_id,
                        channel = channel.channel_name(),
                        error = %e,
                        duration_ms,
                        "Notification delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                user_id: notification.user_id,
                success,
                error,
                duration_ms,
            });
        }

        results
    }

    /// Fire-and-forget delivery on a background task.
    ///
    /// Returns immediately. Outside a tokio runtime the notification is
    /// dropped with a warning.
    pub fn notify(self: &Arc<Self>, notification: Notification) {
        if self.channels.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let dispatcher = Arc::clone(self);
                handle.spawn(async move {
                    dispatcher.dispatch(&notification).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    user_id = %notification.user_id,
                    "No async runtime available; notification dropped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NotifyError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    fn mock(name: &str, count: &Arc<AtomicUsize>, should_fail: bool) -> Arc<dyn Notifier> {
        Arc::new(MockNotifier {
            name: name.to_string(),
            send_count: count.clone(),
            should_fail,
        })
    }

    #[tokio::test]
    async fn dispatch_to_all_channels() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));

        let dispatcher = Dispatcher::new(vec![
            mock("a", &count_a, false),
            mock("b", &count_b, false),
        ]);

        let notification = Notification::new(Uuid::new_v4(), "test", "test body");
        let results = dispatcher.dispatch(&notification).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(vec![
            mock("fail", &Arc::new(AtomicUsize::new(0)), true),
            mock("ok", &count, false),
        ]);

        let notification = Notification::new(Uuid::new_v4(), "test", "test body");
        let results = dispatcher.dispatch(&notification).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(count.load(Ordering::SeqCst), 1); // second channel still sent
    }

    #[tokio::test]
    async fn empty_dispatcher_returns_empty() {
        let dispatcher = Dispatcher::empty();
        let notification = Notification::new(Uuid::new_v4(), "test", "test");
        let results = dispatcher.dispatch(&notification).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn notify_delivers_in_background() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Dispatcher::new(vec![mock("a", &count, true)]));

        dispatcher.notify(Notification::new(Uuid::new_v4(), "t", "b"));

        for _ in 0..50 {
            if count.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
