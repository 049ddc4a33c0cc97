//! Event source contract consumed by the scheduler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SourceError;
use crate::event::{Event, ReminderMode};

/// Anything that can answer "what is the next relevant event?".
///
/// Implementations filter to a bounded horizon, drop cancelled entries,
/// expand recurring entries into single occurrences and return the event
/// whose anchor (per `mode`) is soonest and not yet past.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn next_event(
        &self,
        now: DateTime<Utc>,
        mode: ReminderMode,
    ) -> Result<Option<Event>, SourceError>;
}

/// Pick the soonest-anchored pending event, keeping input order on ties.
pub fn select_next(
    events: impl IntoIterator<Item = Event>,
    now: DateTime<Utc>,
    mode: ReminderMode,
) -> Option<Event> {
    let mut best: Option<Event> = None;
    for event in events {
        if !event.is_pending(now, mode) {
            tracing::debug!(
                event_id = %event.id,
                title = %event.title,
                anchor = %event.anchor(mode),
                "skipping, anchor before now"
            );
            continue;
        }
        let better = match &best {
            Some(current) => event.anchor(mode) < current.anchor(mode),
            None => true,
        };
        if better {
            best = Some(event);
        }
    }
    best
}
