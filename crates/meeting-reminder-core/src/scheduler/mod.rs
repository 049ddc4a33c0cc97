//! Reminder scheduler.
//!
//! The control loop that turns polled "next event" snapshots into at most
//! one alert per event id:
//! - Polls the event source every `poll_interval`
//! - Computes `wait = (anchor - now) - lead_time` and races it against the
//!   next poll, so a changed or cancelled event is picked up within one
//!   poll interval
//! - Arms the alert device for `notification_duration` and resolves the
//!   acknowledge-vs-deadline race
//!
//! ```text
//! Idle ──event──▶ Waiting ──due──▶ Notifying ──ack | deadline──▶ Idle
//!   ▲               │
//!   └──poll wins────┘
//! ```

mod plan;

pub use plan::{plan_reminder, Plan};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::device::AlertDevice;
use crate::error::ConfigError;
use crate::event::{Event, ReminderMode};
use crate::race::{race, Race};
use crate::session::{AlertSession, NotifyOutcome};
use crate::source::EventSource;
use crate::tracker::NotifiedSet;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How often the event source is queried
    pub poll_interval: Duration,
    /// How long before the anchor the reminder fires
    pub lead_time: Duration,
    /// How long the device stays armed without an acknowledge
    pub notification_duration: Duration,
    pub mode: ReminderMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::seconds(5),
            lead_time: Duration::minutes(2),
            notification_duration: Duration::seconds(30),
            mode: ReminderMode::BeforeStart,
        }
    }
}

impl SchedulerConfig {
    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval <= Duration::zero() {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval".to_string(),
                message: format!("must be positive, got {}s", self.poll_interval.num_seconds()),
            });
        }
        if self.lead_time < Duration::zero() {
            return Err(ConfigError::InvalidValue {
                key: "lead_time".to_string(),
                message: format!("must not be negative, got {}s", self.lead_time.num_seconds()),
            });
        }
        if self.notification_duration < Duration::zero() {
            return Err(ConfigError::InvalidValue {
                key: "notification_duration".to_string(),
                message: format!(
                    "must not be negative, got {}s",
                    self.notification_duration.num_seconds()
                ),
            });
        }
        Ok(())
    }
}

/// What the scheduler is doing right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Waiting {
        event_id: String,
        anchor: DateTime<Utc>,
    },
    Notifying {
        event_id: String,
        deadline: DateTime<Utc>,
    },
}

/// Result of one poll step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The source had nothing qualifying.
    NoEvent,
    /// The source query failed; retried after one poll interval.
    SourceFailed,
    /// The returned event was already notified.
    AlreadyNotified { event_id: String },
    /// The poll interval elapsed before the reminder was due.
    Rescheduled { event_id: String },
    /// A notification fired and resolved.
    Notified {
        event_id: String,
        outcome: NotifyOutcome,
    },
}

/// Polls an [`EventSource`] and drives an [`AlertDevice`] for each event at
/// most once.
pub struct ReminderScheduler {
    config: SchedulerConfig,
    source: Arc<dyn EventSource>,
    device: Arc<dyn AlertDevice>,
    clock: Arc<dyn Clock>,
    notified: NotifiedSet,
    state: watch::Sender<SchedulerState>,
}

impl ReminderScheduler {
    /// Validates `config`; invalid durations are fatal here, before any
    /// polling starts.
    pub fn new(
        config: SchedulerConfig,
        source: Arc<dyn EventSource>,
        device: Arc<dyn AlertDevice>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (state, _) = watch::channel(SchedulerState::Idle);
        Ok(Self {
            config,
            source,
            device,
            clock: Arc::new(SystemClock),
            notified: NotifiedSet::new(),
            state,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn notified(&self) -> &NotifiedSet {
        &self.notified
    }

    pub fn state(&self) -> SchedulerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Run poll steps until `shutdown` is cancelled. A notification in
    /// progress is abandoned and the device disarmed.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        tracing::info!(
            poll_secs = self.config.poll_interval.num_seconds(),
            lead_secs = self.config.lead_time.num_seconds(),
            notify_secs = self.config.notification_duration.num_seconds(),
            mode = %self.config.mode,
            "reminder scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = self.poll_step() => {
                    tracing::trace!(?outcome, "poll step finished");
                }
            }
        }

        if let Err(err) = self.device.disarm().await {
            tracing::warn!(error = %err, "failed to disarm device on shutdown");
        }
        self.state.send_replace(SchedulerState::Idle);
        tracing::info!(notified = self.notified.len(), "reminder scheduler stopped");
    }

    /// One iteration of the loop, including whatever sleeping it implies.
    ///
    /// Returns immediately after a notification or a lost race against the
    /// poll interval, so the caller re-polls at once. Every other outcome
    /// has already slept one poll interval.
    pub async fn poll_step(&mut self) -> PollOutcome {
        let poll = self.poll_interval();
        let mode = self.config.mode;

        let event = match self.source.next_event(self.clock.now(), mode).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::debug!("no upcoming event");
                self.idle_for(poll).await;
                return PollOutcome::NoEvent;
            }
            Err(err) => {
                tracing::warn!(error = %err, "event source query failed");
                self.idle_for(poll).await;
                return PollOutcome::SourceFailed;
            }
        };

        if self.notified.contains(&event.id) {
            tracing::debug!(event_id = %event.id, title = %event.title, "already notified");
            self.idle_for(poll).await;
            return PollOutcome::AlreadyNotified { event_id: event.id };
        }

        let anchor = event.anchor(mode);
        match plan_reminder(anchor, self.clock.now(), self.config.lead_time) {
            Plan::NotifyNow => {
                let outcome = self.notify(&event).await;
                PollOutcome::Notified {
                    event_id: event.id,
                    outcome,
                }
            }
            Plan::WaitFor(wait) => {
                tracing::debug!(
                    event_id = %event.id,
                    title = %event.title,
                    %anchor,
                    wait_secs = wait.as_secs(),
                    "waiting for reminder"
                );
                self.state.send_replace(SchedulerState::Waiting {
                    event_id: event.id.clone(),
                    anchor,
                });

                match race(tokio::time::sleep(wait), tokio::time::sleep(poll)).await {
                    Race::First(()) => {
                        let outcome = self.notify(&event).await;
                        PollOutcome::Notified {
                            event_id: event.id,
                            outcome,
                        }
                    }
                    Race::Second(()) => PollOutcome::Rescheduled { event_id: event.id },
                }
            }
        }
    }

    /// Fire the alert for `event` and wait for it to resolve.
    ///
    /// The event is marked before the device is touched: a device fault
    /// still counts as notified.
    pub async fn notify(&mut self, event: &Event) -> NotifyOutcome {
        self.notified.mark_notified(&event.id);

        let duration = self.config.notification_duration.to_std().unwrap_or_default();
        let session = AlertSession::open(&event.id, duration);
        self.state.send_replace(SchedulerState::Notifying {
            event_id: event.id.clone(),
            deadline: self.clock.now() + self.config.notification_duration,
        });
        tracing::info!(
            event_id = %event.id,
            title = %event.title,
            location = %event.location,
            anchor = %event.anchor(self.config.mode),
            "reminder firing"
        );

        let outcome = match self.device.arm(session.deadline()).await {
            Ok(signal) => session.resolve(signal).await,
            Err(err) => {
                tracing::warn!(event_id = %event.id, error = %err, "failed to arm alert device");
                session.expire().await
            }
        };

        if let Err(err) = self.device.disarm().await {
            tracing::warn!(event_id = %event.id, error = %err, "failed to disarm alert device");
        }
        self.state.send_replace(SchedulerState::Idle);
        tracing::info!(event_id = %event.id, %outcome, "reminder finished");
        outcome
    }

    fn poll_interval(&self) -> std::time::Duration {
        self.config.poll_interval.to_std().unwrap_or_default()
    }

    async fn idle_for(&self, poll: std::time::Duration) {
        self.state.send_replace(SchedulerState::Idle);
        tokio::time::sleep(poll).await;
    }
}
