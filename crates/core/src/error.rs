use thiserror::Error;

/// Failures raised by the event storage collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Semantic matcher error: {0}")]
    Matcher(String),
}

/// Errors surfaced to callers of the alert engine.
///
/// Insufficient data is deliberately absent: a baseline that is too small
/// resolves to a not-triggered evaluation with a reason string.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid alert configuration for '{alert_id}': {message}")]
    InvalidConfiguration { alert_id: String, message: String },

    #[error("Alert not found: {0}")]
    AlertNotFound(String),

    #[error("History record not found: {0}")]
    HistoryNotFound(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl EngineError {
    pub fn invalid(alert_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            alert_id: alert_id.into(),
            message: message.into(),
        }
    }
}
