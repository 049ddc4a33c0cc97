//! First-past-the-post combinator.
//!
//! Used for both races in the system: "reminder due" against "time to
//! re-poll", and "acknowledged" against "session deadline".

use std::future::Future;

/// Which side of a [`race`] completed first, with its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Race<A, B> {
    First(A),
    Second(B),
}

impl<A, B> Race<A, B> {
    pub fn is_first(&self) -> bool {
        matches!(self, Race::First(_))
    }
}

/// Drive both futures and return as soon as one completes. The loser is
/// dropped, which cancels it. When both are ready on the same poll,
/// `first` wins.
pub async fn race<A, B, FA, FB>(first: FA, second: FB) -> Race<A, B>
where
    FA: Future<Output = A>,
    FB: Future<Output = B>,
{
    tokio::select! {
        biased;
        a = first => Race::First(a),
        b = second => Race::Second(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    #[tokio::test(start_paused = true)]
    async fn shorter_timer_wins() {
        let started = Instant::now();
        let result = race(sleep(Duration::from_secs(5)), async {
            sleep(Duration::from_secs(2)).await;
            "poll"
        })
        .await;
        assert_eq!(result, Race::Second("poll"));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn tie_goes_to_first() {
        let result = race(sleep(Duration::from_secs(1)), sleep(Duration::from_secs(1))).await;
        assert!(result.is_first());
    }

    #[tokio::test(start_paused = true)]
    async fn loser_is_cancelled() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<&str>();
        let slow_tx = tx.clone();
        let _ = race(sleep(Duration::from_millis(10)), async move {
            sleep(Duration::from_secs(10)).await;
            let _ = slow_tx.send("late");
        })
        .await;
        drop(tx);

        sleep(Duration::from_secs(20)).await;
        assert!(rx.recv().await.is_none());
    }
}
