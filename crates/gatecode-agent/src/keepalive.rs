//! Keep-alive (spec C7): while the agent is between turns with nothing to
//! stream, periodically emit an idle marker so a client with a read timeout
//! doesn't give up on the connection. Shares the same output sink a caller
//! already writes wire envelopes through, so emission order is exactly what
//! the sink's own write lock decides — no separate buffering here.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Runs `emit` every `interval` until cancelled. `emit` is expected to write
/// exactly one `keep_alive` envelope through the shared sink (the caller owns
/// sink/envelope construction — this task only owns timing).
pub struct KeepAliveTask {
    cancel: CancellationToken,
    paused: Arc<Notify>,
}

impl KeepAliveTask {
    /// Spawns the periodic loop and returns a handle that stops it on drop
    /// of the returned `CancellationToken` via `stop()`.
    pub fn spawn<F>(interval: Duration, emit: F) -> Self
    where
        F: Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static,
    {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let paused = Arc::new(Notify::new());
        let task_paused = paused.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = task_paused.notified() => {
                        // Activity just happened elsewhere on the shared sink;
                        // restart the wait so the idle marker doesn't
                        // immediately follow it.
                        continue;
                    }
                    _ = tokio::time::sleep(interval) => {
                        emit().await;
                    }
                }
            }
        });
        Self { cancel, paused }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Lets a caller wake a waiting tick early (e.g. right before emitting a
    /// real envelope, so the idle marker doesn't immediately follow it).
    pub fn notify_activity(&self) {
        self.paused.notify_waiters();
    }
}

impl Drop for KeepAliveTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn emits_on_the_configured_interval_until_stopped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let task = KeepAliveTask::spawn(Duration::from_millis(10), move || {
            let counter = counter_clone.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        task.stop();
        let count_after_stop = counter.load(Ordering::SeqCst);
        assert!(count_after_stop >= 3, "expected at least 3 ticks, got {count_after_stop}");

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), count_after_stop, "no further ticks after stop");
    }

    #[tokio::test]
    async fn notify_activity_defers_the_next_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let task = KeepAliveTask::spawn(Duration::from_millis(30), move || {
            let counter = counter_clone.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });

        // Keep resetting the wait faster than it would otherwise fire.
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            task.notify_activity();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0, "activity should have deferred every tick so far");

        tokio::time::sleep(Duration::from_millis(45)).await;
        assert!(counter.load(Ordering::SeqCst) >= 1, "tick should fire once activity stops");
        task.stop();
    }
}
