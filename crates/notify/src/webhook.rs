//! Generic HTTP webhook notifier.
//!
//! Delivers notifications as JSON payloads to configured webhook URLs
//! with optional custom headers and request body templates.

use std::collections::HashMap;
use std::time::Duration;

use crate::templating::TemplateRenderer;
use crate::traits::{Notification, Notifier, NotifyError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers notifications as JSON over HTTP to a configured endpoint.
///
/// Environment variable references (`${VAR_NAME}`) in the URL and header
/// values are resolved at construction time.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    method: reqwest::Method,
    headers: HashMap<String, String>,
    /// Rendered against the notification (`subject`, `body`, `metadata`)
    /// instead of serializing it directly.
    body_template: Option<String>,
    renderer: TemplateRenderer,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a new webhook notifier.
    ///
    /// `method` defaults to `POST` when `None`. Missing env vars and
    /// unparsable body templates produce a [`NotifyError::Config`] error.
    pub fn new(
        url: String,
        method: Option<reqwest::Method>,
        headers: HashMap<String, String>,
        body_template: Option<String>,
    ) -> Result<Self, NotifyError> {
        let resolved_url = resolve_env_vars(&url)?;

        let mut resolved_headers = HashMap::with_capacity(headers.len());
        for (key, value) in &headers {
            resolved_headers.insert(key.clone(), resolve_env_vars(value)?);
        }

        let renderer = TemplateRenderer::new();
        if let Some(ref tmpl) = body_template {
            renderer
                .validate(tmpl)
                .map_err(|e| NotifyError::Config(format!("invalid body template: {e}")))?;
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: resolved_url,
            method: method.unwrap_or(reqwest::Method::POST),
            headers: resolved_headers,
            body_template,
            renderer,
            client,
        })
    }

    /// Construct a [`WebhookNotifier`] from config-level primitives.
    ///
    /// `method` is parsed case-insensitively from a string (e.g. `"POST"`).
    pub fn from_config(
        url: String,
        method: Option<String>,
        headers: Option<HashMap<String, String>>,
        body_template: Option<String>,
    ) -> Result<Self, NotifyError> {
        let parsed_method = match method {
            Some(m) => m
                .to_uppercase()
                .parse::<reqwest::Method>()
                .map(Some)
                .map_err(|_| NotifyError::Config(format!("invalid HTTP method: {m}")))?,
            None => None,
        };

        Self::new(url, parsed_method, headers.unwrap_or_default(), body_template)
    }

    fn payload(&self, notification: &Notification) -> Result<String, NotifyError> {
        match &self.body_template {
            Some(tmpl) => self.renderer.render(tmpl, notification),
            None => serde_json::to_string(notification)
                .map_err(|e| NotifyError::Config(format!("failed to serialize notification: {e}"))),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = self.payload(notification)?;

        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::Delivery(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::debug!(
            url = %self.url,
            method = %self.method,
            %status,
            "webhook notification delivered"
        );

        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next();
        let mut var_name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            var_name.push(c);
        }
        if !closed {
            return Err(NotifyError::Config(format!(
                "unclosed env var reference in: {input}"
            )));
        }
        let value = std::env::var(&var_name)
            .map_err(|_| NotifyError::Config(format!("env var not found: {var_name}")))?;
        result.push_str(&value);
    }

    Ok(result)
}
