//! Outbound event notifications.
//!
//! The host raises a trigger with a short text payload. The queue decides
//! when to attempt delivery and how often to retry; the sender performs one
//! attempt over a short-lived connection.

pub mod queue;
pub mod trigger;

pub use queue::{NotificationQueue, NotificationRequest, RetryDecision};
pub use trigger::{SendError, TriggerSender};
