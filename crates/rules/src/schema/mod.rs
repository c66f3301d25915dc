//! YAML schema for alert definitions.
//!
//! - `AlertDefinition`: id, metric, filter, window, kind, cooldown, severity
//! - `AlertKind`: tagged union of static / anomaly / semantic_match
//! - `AlertState`: mutable per-alert counters owned by the engine
//! - validation of value ranges and cross-field consistency

mod definition;
mod kind;
mod state;
mod validate;

pub use definition::*;
pub use kind::*;
pub use state::*;
pub use validate::{ValidationIssue, ValidationResult, MAX_BASELINE_DAYS, MAX_WINDOW_DAYS};
