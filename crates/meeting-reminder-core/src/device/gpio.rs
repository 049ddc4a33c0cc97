//! LED + buzzer + button alert device over a generic pin board.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::debounce::RisingEdge;
use super::pattern::RepeatingTask;
use super::{AcknowledgeSignal, AcknowledgeTrigger, AlertDevice};
use crate::error::DeviceError;

/// Minimal pin access the alert device needs.
pub trait Board: Send + Sync + 'static {
    fn set_output(&self, pin: &str, high: bool) -> Result<(), DeviceError>;

    /// Raw sample of an input: a level (0/1) or an interrupt tick count.
    fn read_input(&self, pin: &str) -> Result<i64, DeviceError>;
}

/// Pin names as understood by the board.
#[derive(Debug, Clone)]
pub struct GpioPins {
    pub led: String,
    pub buzzer: String,
    pub button: String,
}

#[derive(Debug, Clone, Copy)]
pub struct GpioTiming {
    /// Half-period of the blink/buzz pattern.
    pub blink_interval: Duration,
    /// How often the button is sampled.
    pub input_poll: Duration,
    /// Rising-edge noise threshold, see [`RisingEdge`].
    pub edge_threshold: i64,
}

impl Default for GpioTiming {
    fn default() -> Self {
        Self {
            blink_interval: Duration::from_millis(250),
            input_poll: Duration::from_millis(25),
            edge_threshold: 0,
        }
    }
}

struct Armed {
    cancel: CancellationToken,
    pattern: RepeatingTask,
    poller: JoinHandle<()>,
}

/// Alert device that blinks an LED and pulses a buzzer in lockstep and
/// watches a button for the acknowledge press.
pub struct GpioDevice<B: Board> {
    board: Arc<B>,
    pins: Arc<GpioPins>,
    timing: GpioTiming,
    armed: Mutex<Option<Armed>>,
}

impl<B: Board> GpioDevice<B> {
    /// Wrap `board` and drive both outputs low.
    pub fn open(board: B, pins: GpioPins, timing: GpioTiming) -> Result<Self, DeviceError> {
        let device = Self {
            board: Arc::new(board),
            pins: Arc::new(pins),
            timing,
            armed: Mutex::new(None),
        };
        set_outputs(&*device.board, &device.pins, false)?;
        Ok(device)
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn is_armed(&self) -> bool {
        self.armed
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    fn take_armed(&self) -> Option<Armed> {
        match self.armed.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    async fn teardown(&self) -> Result<(), DeviceError> {
        if let Some(armed) = self.take_armed() {
            armed.cancel.cancel();
            armed.pattern.join().await;
            if let Err(err) = armed.poller.await {
                tracing::warn!(error = %err, "button poller task failed");
            }
        }
        set_outputs(&*self.board, &self.pins, false)
    }
}

#[async_trait]
impl<B: Board> AlertDevice for GpioDevice<B> {
    async fn arm(&self, deadline: Instant) -> Result<AcknowledgeSignal, DeviceError> {
        if self.is_armed() {
            tracing::debug!("re-arming: tearing down previous alert");
            if let Err(err) = self.teardown().await {
                tracing::warn!(error = %err, "failed to reset outputs before re-arm");
            }
        }

        let cancel = CancellationToken::new();

        let board = self.board.clone();
        let pins = self.pins.clone();
        let pattern = RepeatingTask::spawn(
            self.timing.blink_interval,
            deadline,
            cancel.clone(),
            move |on| {
                if let Err(err) = set_outputs(&*board, &pins, on) {
                    tracing::warn!(error = %err, on, "failed to drive alert outputs");
                }
                std::future::ready(())
            },
        );

        let (trigger, signal) = AcknowledgeSignal::pair();
        let poller = tokio::spawn(watch_button(
            self.board.clone(),
            self.pins.button.clone(),
            self.timing,
            deadline,
            cancel.clone(),
            trigger,
        ));

        let previous = match self.armed.lock() {
            Ok(mut guard) => guard.replace(Armed {
                cancel,
                pattern,
                poller,
            }),
            Err(poisoned) => poisoned.into_inner().replace(Armed {
                cancel,
                pattern,
                poller,
            }),
        };
        if let Some(stale) = previous {
            stale.cancel.cancel();
        }

        tracing::debug!(led = %self.pins.led, buzzer = %self.pins.buzzer, "alert armed");
        Ok(signal)
    }

    async fn disarm(&self) -> Result<(), DeviceError> {
        self.teardown().await
    }
}

fn set_outputs<B: Board + ?Sized>(board: &B, pins: &GpioPins, high: bool) -> Result<(), DeviceError> {
    let led = board.set_output(&pins.led, high);
    let buzzer = board.set_output(&pins.buzzer, high);
    led.and(buzzer)
}

async fn watch_button<B: Board>(
    board: Arc<B>,
    pin: String,
    timing: GpioTiming,
    deadline: Instant,
    cancel: CancellationToken,
    trigger: AcknowledgeTrigger,
) {
    let mut edge = RisingEdge::new(timing.edge_threshold);
    let mut failures = 0u32;

    loop {
        if cancel.is_cancelled() || Instant::now() >= deadline {
            return;
        }

        match board.read_input(&pin) {
            Ok(sample) => {
                failures = 0;
                if edge.observe(sample) {
                    tracing::info!(%pin, "acknowledge pressed");
                    trigger.fire();
                    return;
                }
            }
            Err(err) => {
                failures += 1;
                if failures == 1 {
                    tracing::warn!(error = %err, %pin, "failed to read button");
                } else {
                    tracing::debug!(error = %err, %pin, failures, "failed to read button");
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep_until(deadline) => return,
            _ = tokio::time::sleep(timing.input_poll) => {}
        }
    }
}
