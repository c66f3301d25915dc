//! Routes alert triggers to configured channels.
//!
//! The dispatcher renders one [`Notification`] per approved trigger and
//! delivers it to every channel configured for the alert, falling back to
//! the default channels. Individual channel failures don't block other
//! channels.

use std::collections::HashMap;

use mailpulse_core::{AlertSummary, EvaluationResult};

use crate::templating::{
    TemplateContext, TemplateRenderer, DEFAULT_BODY_TEMPLATE, DEFAULT_SUBJECT_TEMPLATE,
};
use crate::traits::{DispatchResult, Notification, NotificationSink, Notifier, NotifyError};

/// Dispatches notifications to multiple channels, organized per alert.
pub struct Dispatcher {
    /// Alert ID → list of notifier channels for that alert.
    alert_channels: HashMap<String, Vec<Box<dyn Notifier>>>,
    /// Fallback channels used when no alert-specific channels exist.
    default_channels: Vec<Box<dyn Notifier>>,
    renderer: TemplateRenderer,
    subject_template: String,
    body_template: String,
}

impl Dispatcher {
    /// Create a dispatcher with per-alert channel mapping.
    pub fn new(alert_channels: HashMap<String, Vec<Box<dyn Notifier>>>) -> Self {
        Self {
            alert_channels,
            ..Self::empty()
        }
    }

    /// Create an empty dispatcher.
    pub fn empty() -> Self {
        Self {
            alert_channels: HashMap::new(),
            default_channels: Vec::new(),
            renderer: TemplateRenderer::new(),
            subject_template: DEFAULT_SUBJECT_TEMPLATE.to_string(),
            body_template: DEFAULT_BODY_TEMPLATE.to_string(),
        }
    }

    /// Create a simple dispatcher with channels shared across all alerts.
    pub fn with_defaults(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            default_channels: channels,
            ..Self::empty()
        }
    }

    /// Override the subject and body templates.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if either template fails to parse.
    pub fn with_templates(mut self, subject: String, body: String) -> Result<Self, NotifyError> {
        self.renderer.validate(&subject)?;
        self.renderer.validate(&body)?;
        self.subject_template = subject;
        self.body_template = body;
        Ok(self)
    }

    /// Replace all channels for a specific alert.
    pub fn set_alert_channels(&mut self, alert_id: String, channels: Vec<Box<dyn Notifier>>) {
        self.alert_channels.insert(alert_id, channels);
    }

    /// Remove channels for an alert.
    pub fn remove_alert(&mut self, alert_id: &str) {
        self.alert_channels.remove(alert_id);
    }

    fn channels_for(&self, alert_id: &str) -> &[Box<dyn Notifier>] {
        self.alert_channels
            .get(alert_id)
            .unwrap_or(&self.default_channels)
    }

    /// Render the notification for an approved trigger.
    pub fn render(
        &self,
        alert: &AlertSummary,
        result: &EvaluationResult,
    ) -> Result<Notification, NotifyError> {
        let ctx = TemplateContext::new(alert, result);
        let subject = self.renderer.render(&self.subject_template, &ctx)?;
        let body = self.renderer.render(&self.body_template, &ctx)?;

        let mut metadata = HashMap::from([
            ("alert_id".to_string(), alert.id.clone()),
            ("severity".to_string(), alert.severity.to_string()),
            ("kind".to_string(), alert.kind.clone()),
            ("current_value".to_string(), result.current_value.to_string()),
            ("baseline_value".to_string(), result.baseline_value.to_string()),
        ]);
        if let Some(history_id) = result.history_id {
            metadata.insert("history_id".to_string(), history_id.to_string());
        }

        Ok(Notification {
            subject,
            body,
            metadata,
        })
    }

    /// Dispatch a notification for a specific alert to all its channels.
    ///
    /// Returns results for each channel delivery. Individual failures
    /// don't block other channels.
    pub async fn dispatch(&self, alert_id: &str, notification: &Notification) -> Vec<DispatchResult> {
        let channels = self.channels_for(alert_id);

        if channels.is_empty() {
            tracing::debug!(alert_id, "No notification channels configured");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(channels.len());

        for channel in channels {
            let start = std::time::Instant::now();
            let result = channel.send(notification).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        alert_id,
                        channel = channel.channel_name(),
                        duration_ms,
                        "Notification delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        alert_id,
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
                alert_id: alert_id.to_string(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }

    /// Send a test notification to a specific alert's channel by index.
    pub async fn test_notify(&self, alert_id: &str, channel_index: usize) -> Result<(), NotifyError> {
        let channel = self
            .channels_for(alert_id)
            .get(channel_index)
            .ok_or_else(|| {
                NotifyError::Config(format!(
                    "Channel index {channel_index} out of range for alert '{alert_id}'"
                ))
            })?;

        channel.test().await
    }
}

#[async_trait::async_trait]
impl NotificationSink for Dispatcher {
    /// Delivery succeeds when at least one channel accepted the notification.
    async fn on_trigger(
        &self,
        alert: &AlertSummary,
        result: &EvaluationResult,
    ) -> Result<(), NotifyError> {
        if self.channels_for(&alert.id).is_empty() {
            return Err(NotifyError::NoChannels(alert.id.clone()));
        }

        let notification = self.render(alert, result)?;
        let results = self.dispatch(&alert.id, &notification).await;

        if results.iter().any(|r| r.success) {
            return Ok(());
        }
        let errors: Vec<String> = results
            .into_iter()
            .map(|r| format!("{}: {}", r.channel, r.error.unwrap_or_default()))
            .collect();
        Err(NotifyError::Delivery(errors.join("; ")))
    }
}
