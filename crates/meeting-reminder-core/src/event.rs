//! Calendar event snapshot and reminder anchoring.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Selects which edge of an event the reminder is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderMode {
    /// Remind ahead of the event's start.
    #[default]
    BeforeStart,
    /// Remind ahead of the event's end.
    BeforeEnd,
}

impl ReminderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeStart => "before_start",
            Self::BeforeEnd => "before_end",
        }
    }
}

impl fmt::Display for ReminderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReminderMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "before_start" | "start" => Ok(Self::BeforeStart),
            "before_end" | "end" => Ok(Self::BeforeEnd),
            other => Err(ValidationError::InvalidValue {
                field: "mode".to_string(),
                message: format!("expected before_start or before_end, got '{other}'"),
            }),
        }
    }
}

/// A single concrete calendar occurrence, as returned by an event source.
///
/// Construct through [`Event::new`]; it enforces `start <= end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier of the calendar entry.
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub title: String,
    pub location: String,
    pub status: String,
}

impl Event {
    /// Build an event, rejecting inverted time ranges.
    pub fn new(
        id: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self {
            id: id.into(),
            start,
            end,
            title: String::new(),
            location: String::new(),
            status: String::new(),
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// The instant the lead time is measured against.
    pub fn anchor(&self, mode: ReminderMode) -> DateTime<Utc> {
        match mode {
            ReminderMode::BeforeStart => self.start,
            ReminderMode::BeforeEnd => self.end,
        }
    }

    /// Whether the anchored edge is still ahead of (or at) `now`.
    pub fn is_pending(&self, now: DateTime<Utc>, mode: ReminderMode) -> bool {
        self.anchor(mode) >= now
    }
}
