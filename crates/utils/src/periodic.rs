//! Cancellable periodic background task with a drain step on shutdown

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};

/// A spawned loop that runs `tick` every `period` until stopped, then runs
/// `drain` exactly once and exits with its output.
///
/// The first tick fires one full period after spawning. Dropping the handle
/// without calling [`PeriodicTask::stop`] also ends the loop (the shutdown
/// channel closes) and still runs `drain`, but nobody observes its output.
pub struct PeriodicTask<T> {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<T>>>,
}

impl<T: Send + 'static> PeriodicTask<T> {
    /// Spawn the loop on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime or if `period` is zero. A
    /// `period` too long for the clock to represent never ticks.
    pub fn spawn<Tick, TickFut, Drain, DrainFut>(
        name: &'static str,
        period: Duration,
        mut tick: Tick,
        drain: Drain,
    ) -> Self
    where
        Tick: FnMut() -> TickFut + Send + 'static,
        TickFut: Future<Output = ()> + Send,
        Drain: FnOnce() -> DrainFut + Send + 'static,
        DrainFut: Future<Output = T> + Send,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            match Instant::now().checked_add(period) {
                Some(start) => {
                    let mut ticker = time::interval_at(start, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                    loop {
                        tokio::select! {
                            biased;
                            changed = shutdown_rx.changed() => {
                                if changed.is_err() || *shutdown_rx.borrow() {
                                    break;
                                }
                            }
                            _ = ticker.tick() => tick().await,
                        }
                    }
                }
                // The first tick is past what the clock can represent.
                None => {
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                }
            }

            tracing::debug!(task = name, "periodic task draining");
            drain().await
        });

        Self {
            name,
            shutdown,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Signal shutdown and wait for the drain step to finish.
    ///
    /// Returns `Ok(None)` if the task was already stopped by an earlier call.
    pub async fn stop(&self) -> Result<Option<T>, JoinError> {
        self.shutdown.send_replace(true);
        let handle = self.handle.lock().take();
        match handle {
            Some(handle) => {
                let output = handle.await?;
                tracing::debug!(task = self.name, "periodic task stopped");
                Ok(Some(output))
            }
            None => Ok(None),
        }
    }

    /// Whether `stop` has not been called yet.
    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> std::fmt::Debug for PeriodicTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("running", &self.handle.lock().is_some())
            .finish()
    }
}
