//! Notifier trait definition and shared error types.

use std::collections::HashMap;

use mailpulse_core::{AlertSummary, EvaluationResult};

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No notification channels configured for alert '{0}'")]
    NoChannels(String),

    #[error("Delivery failed on every channel: {0}")]
    Delivery(String),
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    /// The rendered subject/title.
    pub subject: String,
    /// The rendered body content.
    pub body: String,
    /// Additional metadata (e.g., severity, alert id).
    pub metadata: HashMap<String, String>,
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Test connectivity with a sample notification.
    async fn test(&self) -> Result<(), NotifyError> {
        let test_notification = Notification {
            subject: "[TEST] Mailpulse alert test".to_string(),
            body: "This is a test notification from the mailpulse alert engine.".to_string(),
            metadata: HashMap::from([
                ("alert_id".to_string(), "test-alert".to_string()),
                ("verdict".to_string(), "triggered".to_string()),
            ]),
        };
        self.send(&test_notification).await
    }

    /// Human-readable name for this channel (e.g., "webhook", "log").
    fn channel_name(&self) -> &str;
}

/// Receiver of approved triggers.
///
/// The engine calls this once per trigger, after the history record has been
/// written. An `Err` is recorded on that record but never rolls it back.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn on_trigger(
        &self,
        alert: &AlertSummary,
        result: &EvaluationResult,
    ) -> Result<(), NotifyError>;
}

/// Result of dispatching a notification to a single channel.
#[derive(Debug)]
pub struct DispatchResult {
    pub channel: String,
    pub alert_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
