use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

/// A periodic background worker with an explicit stop channel.
///
/// Both stores use one of these instead of re-arming ad-hoc timers: the task
/// ticks at a fixed interval, runs the (idempotent) flush callback, and exits
/// when stopped — or when its owner is dropped, since dropping the `watch`
/// sender wakes the task too.
pub(crate) struct Flusher {
    stop: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl Flusher {
    pub fn spawn<F, Fut>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (stop, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            timer.tick().await; // the first tick completes immediately
            loop {
                tokio::select! {
                    _ = timer.tick() => tick().await,
                    _ = stop_rx.changed() => break,
                }
            }
        });
        Self { stop, handle }
    }

    /// Stop the worker and wait for it to wind down. Any in-flight flush
    /// completes first.
    pub async fn stop(self) {
        self.stop.send(true).ok();
        self.handle.await.ok();
    }
}
