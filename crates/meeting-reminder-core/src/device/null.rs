use async_trait::async_trait;
use tokio::time::Instant;

use super::{AcknowledgeSignal, AlertDevice};
use crate::error::DeviceError;

/// Device stand-in for running without hardware. Logs and never
/// acknowledges, so every session runs to its deadline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDevice;

#[async_trait]
impl AlertDevice for NullDevice {
    async fn arm(&self, deadline: Instant) -> Result<AcknowledgeSignal, DeviceError> {
        let secs = deadline.saturating_duration_since(Instant::now()).as_secs();
        tracing::info!(secs, "alert armed (no device attached)");
        Ok(AcknowledgeSignal::never())
    }

    async fn disarm(&self) -> Result<(), DeviceError> {
        tracing::debug!("alert disarmed (no device attached)");
        Ok(())
    }
}
