//! Minijinja template rendering for notification messages.
//!
//! Renders notification subject and body templates using minijinja,
//! with access to alert metadata and the evaluation that triggered it.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call.

use mailpulse_core::{AlertSummary, Contributor, EvaluationResult};

use crate::traits::NotifyError;

pub const DEFAULT_SUBJECT_TEMPLATE: &str =
    "[{{ alert.severity | upper }}] {{ alert.name }}: {{ evaluation.verdict }}";

pub const DEFAULT_BODY_TEMPLATE: &str = "{{ evaluation.reason }}\n\
Current: {{ evaluation.current_value | round(1) }} | Baseline: {{ evaluation.baseline_value | round(1) }}\
{% if evaluation.percentage_change is not none %} | Change: {{ evaluation.percentage_change | round(1) }}%{% endif %}\
{% for c in evaluation.top_contributors %}\n- {{ c.key }}: {{ c.count }}{% endfor %}";

/// Context data available to notification templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext {
    /// Alert metadata that triggered the notification.
    pub alert: AlertContext,
    /// Evaluation numbers.
    pub evaluation: EvaluationContext,
    /// Evaluation timestamp in ISO 8601 format.
    pub now: String,
}

/// Alert metadata exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AlertContext {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub severity: String,
    pub kind: String,
    pub metric: String,
}

/// Evaluation results exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EvaluationContext {
    pub verdict: String,
    pub reason: Option<String>,
    pub current_value: f64,
    pub baseline_value: f64,
    pub score: Option<f64>,
    pub percentage_change: Option<f64>,
    pub top_contributors: Vec<Contributor>,
}

impl TemplateContext {
    pub fn new(alert: &AlertSummary, result: &EvaluationResult) -> Self {
        Self {
            alert: AlertContext {
                id: alert.id.clone(),
                name: alert.name.clone(),
                description: alert.description.clone(),
                severity: alert.severity.to_string(),
                kind: alert.kind.clone(),
                metric: alert.metric.clone(),
            },
            evaluation: EvaluationContext {
                verdict: if result.triggered { "triggered" } else { "not triggered" }.to_string(),
                reason: result.reason.clone(),
                current_value: result.current_value,
                baseline_value: result.baseline_value,
                score: result.score.filter(|s| s.is_finite()),
                percentage_change: result.percentage_change,
                top_contributors: result.top_contributors.clone(),
            },
            now: result.evaluated_at.to_rfc3339(),
        }
    }
}

/// Renders notification templates using minijinja.
///
/// A fresh [`minijinja::Environment`] is created per render call since
/// templates are dynamic strings, not pre-registered files.
#[derive(Debug, Default)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("round", round_filter);
        // `lower` and `upper` are built-in with the "builtins" feature,
        // but we register explicit versions to guarantee availability.
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);
        env
    }

    /// Render a template string with the given context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render<S: serde::Serialize>(&self, template_str: &str, ctx: &S) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Validate that a template string parses without errors.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

/// Custom filter: round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mailpulse_core::{Severity, Verdict};

    fn sample_context() -> TemplateContext {
        let alert = AlertSummary {
            id: "alert-001".to_string(),
            name: "Volume spike".to_string(),
            description: None,
            severity: Severity::High,
            kind: "anomaly".to_string(),
            metric: "email_volume".to_string(),
        };
        let result = EvaluationResult {
            alert_id: "alert-001".to_string(),
            verdict: Verdict::Triggered,
            triggered: true,
            reason: Some("Z-score 8.42 (above baseline)".to_string()),
            current_value: 20.0,
            baseline_value: 10.4,
            score: Some(8.42),
            percentage_change: Some(92.3077),
            time_series: Vec::new(),
            in_cooldown: false,
            cooldown_remaining_minutes: None,
            top_contributors: vec![Contributor {
                key: "desk@bank.com".to_string(),
                count: 12,
            }],
            evaluated_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            history_id: None,
        };
        TemplateContext::new(&alert, &result)
    }

    #[test]
    fn default_subject() {
        let renderer = TemplateRenderer::new();
        let subject = renderer
            .render(DEFAULT_SUBJECT_TEMPLATE, &sample_context())
            .unwrap();
        assert_eq!(subject, "[HIGH] Volume spike: triggered");
    }

    #[test]
    fn default_body_lists_contributors() {
        let renderer = TemplateRenderer::new();
        let body = renderer.render(DEFAULT_BODY_TEMPLATE, &sample_context()).unwrap();
        assert!(body.starts_with("Z-score 8.42 (above baseline)\n"));
        assert!(body.contains("Current: 20.0 | Baseline: 10.4 | Change: 92.3%"));
        assert!(body.ends_with("- desk@bank.com: 12"));
    }

    #[test]
    fn body_without_percentage_change() {
        let renderer = TemplateRenderer::new();
        let mut ctx = sample_context();
        ctx.evaluation.percentage_change = None;
        let body = renderer.render(DEFAULT_BODY_TEMPLATE, &ctx).unwrap();
        assert!(!body.contains("Change:"));
    }

    #[test]
    fn infinite_score_is_hidden() {
        let mut ctx = sample_context();
        ctx.evaluation.score = Some(f64::INFINITY).filter(|s| s.is_finite());
        let renderer = TemplateRenderer::new();
        assert_eq!(renderer.render("{{ evaluation.score }}", &ctx).unwrap(), "none");
    }

    #[test]
    fn render_optional_fields() {
        let renderer = TemplateRenderer::new();
        let result = renderer
            .render("Desc: {{ alert.description }}", &sample_context())
            .unwrap();
        assert_eq!(result, "Desc: none");
    }

    #[test]
    fn invalid_template_produces_error() {
        let renderer = TemplateRenderer::new();
        match renderer.render("{{ unclosed", &sample_context()) {
            Err(NotifyError::Template(msg)) => assert!(!msg.is_empty()),
            other => panic!("Expected Template error, got: {:?}", other),
        }
        assert!(renderer.validate("{{ unclosed").is_err());
        assert!(renderer.validate("Hello {{ alert.name }}").is_ok());
    }
}
