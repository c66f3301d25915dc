//! Notifier that writes triggers to the tracing log.
//!
//! Useful as a default channel for local runs where no webhook is set up.

use crate::traits::{Notification, Notifier, NotifyError};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let alert_id = notification
            .metadata
            .get("alert_id")
            .map(String::as_str)
            .unwrap_or("unknown");
        tracing::warn!(
            alert_id,
            subject = %notification.subject,
            body = %notification.body,
            "ALERT"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
