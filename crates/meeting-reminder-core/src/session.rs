//! One armed-device episode, bounded by a deadline.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use crate::device::AcknowledgeSignal;
use crate::race::{race, Race};

/// How an alert session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The acknowledge input fired before the deadline.
    Acknowledged,
    /// The deadline elapsed first.
    Expired,
}

impl fmt::Display for NotifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acknowledged => f.write_str("acknowledged"),
            Self::Expired => f.write_str("expired"),
        }
    }
}

/// An open alert session. Consumed by [`AlertSession::resolve`] or
/// [`AlertSession::expire`], so it can never be reused.
#[derive(Debug)]
pub struct AlertSession {
    event_id: String,
    opened_at: Instant,
    deadline: Instant,
}

impl AlertSession {
    pub fn open(event_id: impl Into<String>, duration: Duration) -> Self {
        let opened_at = Instant::now();
        Self {
            event_id: event_id.into(),
            opened_at,
            deadline: opened_at + duration,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the acknowledge signal or the deadline, whichever is first.
    pub async fn resolve(self, signal: AcknowledgeSignal) -> NotifyOutcome {
        let outcome = match race(signal.acknowledged(), tokio::time::sleep_until(self.deadline)).await {
            Race::First(()) => NotifyOutcome::Acknowledged,
            Race::Second(()) => NotifyOutcome::Expired,
        };
        tracing::debug!(
            event_id = %self.event_id,
            %outcome,
            held_ms = self.opened_at.elapsed().as_millis() as u64,
            "alert session closed"
        );
        outcome
    }

    /// Used when the device could not be armed: nothing can acknowledge, so
    /// the session simply runs out its deadline.
    pub async fn expire(self) -> NotifyOutcome {
        tokio::time::sleep_until(self.deadline).await;
        NotifyOutcome::Expired
    }
}
