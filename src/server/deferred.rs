//! Holds back the reply to a button push until the control loop has had time
//! to act on it.
//!
//! The deadline is a timing heuristic: once it passes the status page is sent
//! whether or not the button action has actually completed.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct PendingResponse {
    armed: bool,
    deadline: Instant,
}

impl PendingResponse {
    pub fn new() -> Self {
        Self {
            armed: false,
            deadline: Instant::now(),
        }
    }

    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.armed = true;
        self.deadline = now + delay;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.then_some(self.deadline)
    }

    /// Disarms and returns true once `now` is past the deadline.
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        if self.armed && now > self.deadline {
            self.armed = false;
            return true;
        }
        false
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Default for PendingResponse {
    fn default() -> Self {
        Self::new()
    }
}
