//! # Meeting Reminder Core Library
//!
//! Watches a calendar and fires a physical reminder (light and sound) a
//! configurable lead time before a meeting starts or ends. The alert is
//! silenced by a button press or stops on its own after a fixed duration.
//!
//! ## Architecture
//!
//! - **Scheduler**: polls an event source, races "reminder due" against
//!   "next poll", and notifies each event id at most once per process
//! - **Alert session**: one armed-device episode, resolved by acknowledge
//!   or deadline
//! - **Integrations**: Google Calendar source and OAuth token plumbing
//! - **Device**: GPIO LED/buzzer/button driver and a log-only stand-in
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`ReminderScheduler`]: the control loop
//! - [`EventSource`]: where events come from
//! - [`AlertDevice`]: what gets armed
//! - [`Config`]: application configuration management

pub mod clock;
pub mod device;
pub mod error;
pub mod event;
pub mod integrations;
pub mod race;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod storage;
pub mod tracker;

pub use clock::{Clock, SystemClock, TokioClock};
pub use device::{AcknowledgeSignal, AcknowledgeTrigger, AlertDevice, GpioDevice, NullDevice, SysfsBoard};
pub use error::{ConfigError, DeviceError, OAuthError, SourceError, ValidationError};
pub use event::{Event, ReminderMode};
pub use integrations::{GoogleAuth, GoogleCalendarSource, GoogleCredentials, TokenStore};
pub use race::{race, Race};
pub use scheduler::{PollOutcome, ReminderScheduler, SchedulerConfig, SchedulerState};
pub use session::{AlertSession, NotifyOutcome};
pub use source::EventSource;
pub use storage::Config;
pub use tracker::NotifiedSet;
