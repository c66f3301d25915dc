//! Shared domain model for the mailpulse alert engine.
//!
//! Events and filters, evaluation results and trigger history, the
//! storage and semantic-match collaborator traits, configuration and errors.

pub mod alert;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod semantic;
pub mod store;

pub use alert::*;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use error::*;
pub use event::*;
pub use semantic::SemanticMatcher;
pub use store::{EventStore, MemoryEventStore};
