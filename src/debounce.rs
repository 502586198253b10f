//! A single replaceable deadline.
//!
//! Arming replaces whatever deadline was pending, so rearming is observably
//! an uninterruptible cancel-then-schedule. Cancelling an already-fired or
//! never-armed deadline is a no-op.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// (Re)arm: the deadline becomes now + delay, replacing any previous one.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves once the armed deadline elapses and disarms it. Intended for
    /// a `select!` branch guarded by [`Debounce::is_armed`]; pends forever
    /// when nothing is armed.
    pub async fn expired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
