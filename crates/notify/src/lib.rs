//! Outbound notification delivery for compliance alerts.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Webhook and log notifier implementations
//! - Minijinja template rendering for webhook bodies
//! - Fire-and-forget `Dispatcher` fanning a notification out to every channel

pub mod dispatcher;
pub mod log;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use traits::{Notification, Notifier, NotifyError, Priority};
