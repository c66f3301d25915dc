//! Alert definitions and the engine that evaluates them.
//!
//! This crate provides:
//! - YAML alert definitions with serde deserialization and validation
//! - Filesystem loader for alert definition directories
//! - Alert evaluator for static, statistical, clustering and semantic alerts
//! - Cooldown gate with daily caps and consecutive-anomaly hysteresis
//! - Alert engine with per-alert locking, trigger history and notification hooks
//! - Scheduler loop evaluating alerts as their check frequency comes due

pub mod engine;
pub mod evaluator;
pub mod gate;
pub mod loader;
pub mod repository;
pub mod scheduler;
pub mod schema;

pub use engine::{AlertEngine, AlertOutcome};
pub use evaluator::{AlertEvaluator, Observation};
pub use gate::{CooldownGate, GateDecision};
pub use loader::{AlertLoader, LoadReport};
pub use repository::{AlertRepository, MemoryAlertRepository, StoredAlert};
pub use scheduler::{PassSummary, SchedulerLoop};
