//! Retry bookkeeping for the outbound trigger.

use std::time::Duration;

use tokio::time::Instant;

/// A payload waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub payload: String,
    /// Failed attempts so far.
    pub retry_count: u32,
    pub next_attempt: Instant,
}

/// What happens after a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAt(Instant),
    GaveUp,
}

/// Holds at most one pending notification.
///
/// The first attempt waits one retry delay, since the trigger usually fires
/// right as power changes and the site's network gear is still coming up.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    current: Option<NotificationRequest>,
    max_retries: u32,
    retry_delay: Duration,
}

impl NotificationQueue {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            current: None,
            max_retries,
            retry_delay,
        }
    }

    /// Queues `payload`, replacing anything not yet delivered.
    pub fn enqueue(&mut self, payload: String, now: Instant) {
        if let Some(old) = &self.current {
            tracing::warn!(
                dropped = %old.payload,
                replacement = %payload,
                "Pending notification superseded"
            );
        }
        self.current = Some(NotificationRequest {
            payload,
            retry_count: 0,
            next_attempt: now + self.retry_delay,
        });
    }

    pub fn is_queued(&self) -> bool {
        self.current.is_some()
    }

    pub fn pending(&self) -> Option<&NotificationRequest> {
        self.current.as_ref()
    }

    /// The pending request, if its next attempt time has come.
    pub fn due(&self, now: Instant) -> Option<&NotificationRequest> {
        self.current.as_ref().filter(|r| now >= r.next_attempt)
    }

    pub fn mark_sent(&mut self) {
        self.current = None;
    }

    pub fn mark_failed(&mut self, now: Instant) -> RetryDecision {
        let Some(request) = self.current.as_mut() else {
            return RetryDecision::GaveUp;
        };

        request.retry_count += 1;
        if request.retry_count > self.max_retries {
            tracing::warn!(
                payload = %request.payload,
                attempts = request.retry_count,
                "Giving up on notification"
            );
            self.current = None;
            return RetryDecision::GaveUp;
        }

        request.next_attempt = now + self.retry_delay;
        RetryDecision::RetryAt(request.next_attempt)
    }
}
