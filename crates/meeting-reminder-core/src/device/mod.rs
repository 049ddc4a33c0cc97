//! Alert device contract and drivers.
//!
//! - `debounce.rs`: rising-edge policy applied to raw input samples
//! - `pattern.rs`: cancellable repeating on/off task
//! - `gpio.rs`: [`GpioDevice`], the LED + buzzer + button driver over a [`Board`]
//! - `sysfs.rs`: Linux sysfs GPIO board
//! - `null.rs`: log-only device for running without hardware

mod debounce;
mod gpio;
mod null;
mod pattern;
mod sysfs;

pub use debounce::RisingEdge;
pub use gpio::{Board, GpioDevice, GpioPins, GpioTiming};
pub use null::NullDevice;
pub use pattern::RepeatingTask;
pub use sysfs::SysfsBoard;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::DeviceError;

/// Something that can flash/buzz until told to stop and report a single
/// acknowledge press.
#[async_trait]
pub trait AlertDevice: Send + Sync {
    /// Start the alert pattern. It stops on its own at `deadline`. The
    /// returned signal fires at most once, on an acknowledge press detected
    /// before `deadline`.
    async fn arm(&self, deadline: Instant) -> Result<AcknowledgeSignal, DeviceError>;

    /// Stop the pattern and the input poller. Safe to call when not armed.
    async fn disarm(&self) -> Result<(), DeviceError>;
}

/// Sending half of an acknowledge signal, held by the input poller.
#[derive(Debug)]
pub struct AcknowledgeTrigger {
    tx: oneshot::Sender<()>,
}

impl AcknowledgeTrigger {
    /// Fire the signal. Consumes the trigger so it can fire only once.
    pub fn fire(self) {
        let _ = self.tx.send(());
    }
}

/// One-shot acknowledge notification returned by [`AlertDevice::arm`].
#[derive(Debug)]
pub struct AcknowledgeSignal {
    rx: oneshot::Receiver<()>,
}

impl AcknowledgeSignal {
    pub fn pair() -> (AcknowledgeTrigger, AcknowledgeSignal) {
        let (tx, rx) = oneshot::channel();
        (AcknowledgeTrigger { tx }, AcknowledgeSignal { rx })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self::pair().1
    }

    /// Resolves when the acknowledge fires. If the trigger is dropped
    /// without firing this never resolves; the session deadline ends the wait.
    pub async fn acknowledged(self) {
        if self.rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
