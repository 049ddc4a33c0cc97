//! Cancellable on/off toggler.
//!
//! ```text
//! on ─ period ─ off ─ period ─ on ─ ... ─ (cancel | deadline) ─ off
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A background task that calls `apply(true)`, `apply(false)`, ... every
/// `period` until its token is cancelled or `deadline` passes, then calls
/// `apply(false)` once more.
pub struct RepeatingTask {
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    pub fn spawn<F, Fut>(
        period: Duration,
        deadline: Instant,
        cancel: CancellationToken,
        mut apply: F,
    ) -> Self
    where
        F: FnMut(bool) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut state = true;
            loop {
                if cancel.is_cancelled() || Instant::now() >= deadline {
                    break;
                }
                apply(state).await;
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep_until(deadline) => break,
                    _ = tokio::time::sleep(period) => state = !state,
                }
            }
            apply(false).await;
        });
        Self { handle }
    }

    /// Wait for the task to finish its final `apply(false)`.
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            tracing::warn!(error = %err, "alert pattern task failed");
        }
    }
}
