//! Notification side of the mailpulse alert engine.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - `NotificationSink`, the hook the engine calls for every approved trigger
//! - Webhook and log notifier implementations
//! - Minijinja template rendering for notification messages
//! - Dispatcher that routes notifications to configured channels

pub mod dispatcher;
pub mod log;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use log::LogNotifier;
pub use traits::{DispatchResult, Notification, NotificationSink, Notifier, NotifyError};
pub use webhook::WebhookNotifier;
