//! Integration tests for the reminder scheduler.
//!
//! All tests run on a paused tokio clock; wall time comes from a
//! `TokioClock`, so "now" and every sleep move together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use meeting_reminder_core::{
    AcknowledgeSignal, AlertDevice, DeviceError, Event, EventSource, NotifyOutcome, PollOutcome,
    ReminderMode, ReminderScheduler, SchedulerConfig, SchedulerState, SourceError, TokioClock,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type Script = Box<dyn Fn(DateTime<Utc>, usize) -> Result<Option<Event>, SourceError> + Send + Sync>;

/// Event source driven by a closure of (now, call index).
struct ScriptedSource {
    calls: AtomicUsize,
    script: Script,
}

impl ScriptedSource {
    fn new(
        script: impl Fn(DateTime<Utc>, usize) -> Result<Option<Event>, SourceError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Box::new(script),
        })
    }

    fn always(event: Event) -> Arc<Self> {
        Self::new(move |_, _| Ok(Some(event.clone())))
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn next_event(
        &self,
        now: DateTime<Utc>,
        _mode: ReminderMode,
    ) -> Result<Option<Event>, SourceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(now, n)
    }
}

/// Records arm/disarm times relative to test start.
struct RecordingDevice {
    origin: Instant,
    arms: Mutex<Vec<Duration>>,
    disarms: Mutex<Vec<Duration>>,
    ack_after: Option<Duration>,
    fail_arm: bool,
}

impl RecordingDevice {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            arms: Mutex::new(Vec::new()),
            disarms: Mutex::new(Vec::new()),
            ack_after: None,
            fail_arm: false,
        }
    }

    fn acknowledging_after(delay: Duration) -> Self {
        Self {
            ack_after: Some(delay),
            ..Self::new()
        }
    }

    fn failing() -> Self {
        Self {
            fail_arm: true,
            ..Self::new()
        }
    }

    fn arms(&self) -> Vec<Duration> {
        self.arms.lock().unwrap().clone()
    }

    fn disarms(&self) -> Vec<Duration> {
        self.disarms.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertDevice for RecordingDevice {
    async fn arm(&self, _deadline: Instant) -> Result<AcknowledgeSignal, DeviceError> {
        self.arms.lock().unwrap().push(self.origin.elapsed());
        if self.fail_arm {
            return Err(DeviceError::Unavailable("robot offline".to_string()));
        }
        let (trigger, signal) = AcknowledgeSignal::pair();
        if let Some(delay) = self.ack_after {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                trigger.fire();
            });
        }
        Ok(signal)
    }

    async fn disarm(&self) -> Result<(), DeviceError> {
        self.disarms.lock().unwrap().push(self.origin.elapsed());
        Ok(())
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn event_at(id: &str, offset_secs: i64) -> Event {
    let start = t0() + chrono::Duration::seconds(offset_secs);
    Event::new(id, start, start + chrono::Duration::minutes(30))
        .unwrap()
        .with_title("Sync")
}

fn config(poll: i64, lead: i64, duration: i64) -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: chrono::Duration::seconds(poll),
        lead_time: chrono::Duration::seconds(lead),
        notification_duration: chrono::Duration::seconds(duration),
        mode: ReminderMode::BeforeStart,
    }
}

fn scheduler(
    config: SchedulerConfig,
    source: Arc<ScriptedSource>,
    device: Arc<RecordingDevice>,
) -> ReminderScheduler {
    ReminderScheduler::new(config, source, device)
        .unwrap()
        .with_clock(Arc::new(TokioClock::starting_at(t0())))
}

/// Test: poll 1s, lead 10s, duration 5s, anchor at 12s.
#[tokio::test(start_paused = true)]
async fn test_scenario_fires_at_lead_boundary_and_never_again() {
    let device = Arc::new(RecordingDevice::new());
    let source = ScriptedSource::always(event_at("E1", 12));
    let mut scheduler = scheduler(config(1, 10, 5), source, device.clone());
    let started = Instant::now();

    assert_eq!(
        scheduler.poll_step().await,
        PollOutcome::Rescheduled {
            event_id: "E1".to_string()
        }
    );
    assert_eq!(started.elapsed(), secs(1));
    assert!(device.arms().is_empty());

    assert_eq!(
        scheduler.poll_step().await,
        PollOutcome::Notified {
            event_id: "E1".to_string(),
            outcome: NotifyOutcome::Expired
        }
    );
    assert_eq!(device.arms(), vec![secs(2)]);
    assert_eq!(device.disarms(), vec![secs(7)]);

    for _ in 0..10 {
        assert!(matches!(
            scheduler.poll_step().await,
            PollOutcome::AlreadyNotified { .. }
        ));
    }
    assert_eq!(device.arms().len(), 1);
    assert_eq!(started.elapsed(), secs(17));
}

/// Test: an event already inside the lead window fires on first sight.
#[tokio::test(start_paused = true)]
async fn test_immediate_fire_when_already_due() {
    let device = Arc::new(RecordingDevice::new());
    let source = ScriptedSource::always(event_at("soon", 30));
    let mut scheduler = scheduler(config(5, 120, 30), source, device.clone());

    let outcome = scheduler.poll_step().await;
    assert!(matches!(outcome, PollOutcome::Notified { .. }));
    assert_eq!(device.arms(), vec![Duration::ZERO]);
}

/// Test: an event moved earlier is picked up at the next poll.
#[tokio::test(start_paused = true)]
async fn test_staleness_bound_follows_latest_wait() {
    let device = Arc::new(RecordingDevice::new());
    let source = ScriptedSource::new(|_, n| {
        Ok(Some(if n == 0 {
            event_at("moved", 100)
        } else {
            event_at("moved", 20)
        }))
    });
    let mut scheduler = scheduler(config(5, 10, 1), source, device.clone());

    assert!(matches!(
        scheduler.poll_step().await,
        PollOutcome::Rescheduled { .. }
    ));
    assert!(matches!(
        scheduler.poll_step().await,
        PollOutcome::Notified { .. }
    ));
    // first plan said t=90s; the refreshed one says t=10s
    assert_eq!(device.arms(), vec![secs(10)]);
}

/// Test: a cancelled event (source stops returning it) never fires.
#[tokio::test(start_paused = true)]
async fn test_cancelled_event_never_fires() {
    let device = Arc::new(RecordingDevice::new());
    let source = ScriptedSource::new(|_, n| {
        Ok(if n == 0 { Some(event_at("gone", 8)) } else { None })
    });
    let mut scheduler = scheduler(config(1, 5, 1), source, device.clone());

    for _ in 0..10 {
        scheduler.poll_step().await;
    }
    assert!(device.arms().is_empty());
    assert!(scheduler.notified().is_empty());
}

/// Test: acknowledge disarms at the press, not at the deadline.
#[tokio::test(start_paused = true)]
async fn test_acknowledge_wins() {
    let device = Arc::new(RecordingDevice::acknowledging_after(secs(3)));
    let source = ScriptedSource::always(event_at("ack", 0));
    let mut scheduler = scheduler(config(5, 60, 30), source, device.clone());

    assert_eq!(
        scheduler.poll_step().await,
        PollOutcome::Notified {
            event_id: "ack".to_string(),
            outcome: NotifyOutcome::Acknowledged
        }
    );
    assert_eq!(device.disarms(), vec![secs(3)]);
}

/// Test: without a press the device is disarmed exactly at the deadline.
#[tokio::test(start_paused = true)]
async fn test_timeout_wins() {
    let device = Arc::new(RecordingDevice::new());
    let source = ScriptedSource::always(event_at("quiet", 0));
    let mut scheduler = scheduler(config(5, 60, 30), source, device.clone());

    let outcome = scheduler.poll_step().await;
    assert!(matches!(
        outcome,
        PollOutcome::Notified {
            outcome: NotifyOutcome::Expired,
            ..
        }
    ));
    assert_eq!(device.disarms(), vec![secs(30)]);
}

/// Test: an arm failure still counts as notified and still disarms.
#[tokio::test(start_paused = true)]
async fn test_device_fault_marks_event_handled() {
    let device = Arc::new(RecordingDevice::failing());
    let source = ScriptedSource::always(event_at("flaky", 0));
    let mut scheduler = scheduler(config(5, 60, 10), source, device.clone());

    let outcome = scheduler.poll_step().await;
    assert!(matches!(
        outcome,
        PollOutcome::Notified {
            outcome: NotifyOutcome::Expired,
            ..
        }
    ));
    assert_eq!(device.disarms(), vec![secs(10)]);
    assert!(scheduler.notified().contains("flaky"));

    assert!(matches!(
        scheduler.poll_step().await,
        PollOutcome::AlreadyNotified { .. }
    ));
    assert_eq!(device.arms().len(), 1);
}

/// Test: three failed queries, then the event is scheduled normally.
#[tokio::test(start_paused = true)]
async fn test_recovers_after_source_errors() {
    let device = Arc::new(RecordingDevice::new());
    let source = ScriptedSource::new(|_, n| {
        if n < 3 {
            Err(SourceError::Api("503: backend error".to_string()))
        } else {
            Ok(Some(event_at("late", 10)))
        }
    });
    let mut scheduler = scheduler(config(1, 5, 1), source.clone(), device.clone());

    for _ in 0..3 {
        assert_eq!(scheduler.poll_step().await, PollOutcome::SourceFailed);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    let mut outcome = scheduler.poll_step().await;
    while !matches!(outcome, PollOutcome::Notified { .. }) {
        outcome = scheduler.poll_step().await;
    }
    assert_eq!(device.arms(), vec![secs(5)]);
    assert!(source.calls.load(Ordering::SeqCst) > 3);
}

/// Test: an empty calendar sleeps one poll interval per step.
#[tokio::test(start_paused = true)]
async fn test_no_event_sleeps_poll_interval() {
    let device = Arc::new(RecordingDevice::new());
    let source = ScriptedSource::new(|_, _| Ok(None));
    let mut scheduler = scheduler(config(5, 120, 30), source, device);

    let started = Instant::now();
    assert_eq!(scheduler.poll_step().await, PollOutcome::NoEvent);
    assert_eq!(started.elapsed(), secs(5));
}

/// Test: state goes Waiting while sleeping and back to Idle after the alert.
#[tokio::test(start_paused = true)]
async fn test_state_is_published() {
    let device = Arc::new(RecordingDevice::new());
    let source = ScriptedSource::always(event_at("E1", 12));
    let mut scheduler = scheduler(config(1, 10, 5), source, device);
    let rx = scheduler.subscribe();

    scheduler.poll_step().await;
    assert_eq!(
        *rx.borrow(),
        SchedulerState::Waiting {
            event_id: "E1".to_string(),
            anchor: t0() + chrono::Duration::seconds(12),
        }
    );

    scheduler.poll_step().await;
    assert_eq!(*rx.borrow(), SchedulerState::Idle);
}

/// Test: independent schedulers keep independent notified sets.
#[tokio::test(start_paused = true)]
async fn test_schedulers_do_not_share_dedup_state() {
    let first_device = Arc::new(RecordingDevice::new());
    let second_device = Arc::new(RecordingDevice::new());
    let source = ScriptedSource::always(event_at("shared", 0));

    let mut first = scheduler(config(1, 60, 1), source.clone(), first_device.clone());
    let mut second = scheduler(config(1, 60, 1), source, second_device.clone());

    first.poll_step().await;
    second.poll_step().await;
    assert_eq!(first_device.arms().len(), 1);
    assert_eq!(second_device.arms().len(), 1);
}

/// Test: shutdown abandons an active alert and disarms the device.
#[tokio::test(start_paused = true)]
async fn test_run_stops_on_shutdown() {
    let device = Arc::new(RecordingDevice::new());
    let source = ScriptedSource::always(event_at("E1", 0));
    let mut scheduler = scheduler(config(1, 60, 30), source, device.clone());
    let mut rx = scheduler.subscribe();

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let handle = tokio::spawn(async move {
        scheduler.run(token).await;
        scheduler
    });

    rx.wait_for(|state| matches!(state, SchedulerState::Notifying { .. }))
        .await
        .unwrap();
    tokio::time::sleep(secs(2)).await;
    shutdown.cancel();

    let scheduler = handle.await.unwrap();
    assert_eq!(scheduler.notified().len(), 1);
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(device.disarms(), vec![secs(2)]);
}

/// Test: invalid durations are rejected before the loop starts.
#[test]
fn test_negative_durations_are_fatal() {
    let source = ScriptedSource::new(|_, _| Ok(None));
    let device = Arc::new(RecordingDevice::new());
    assert!(ReminderScheduler::new(config(5, -1, 30), source.clone(), device.clone()).is_err());
    assert!(ReminderScheduler::new(config(5, 120, -30), source, device).is_err());
}
