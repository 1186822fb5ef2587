//! Cancellable auto-open countdown.
//!
//! A [`Countdown`] owns a spawned tokio task that reports `seconds`,
//! `seconds - 1`, ... `0` once per period and then runs its completion
//! callback exactly once. Cancelling or dropping the handle aborts the task
//! without running the completion callback.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Handle to a running countdown.
#[derive(Debug)]
pub struct Countdown {
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    /// Starts a countdown on the current tokio runtime.
    ///
    /// `on_tick` receives the remaining seconds, starting with `seconds` right
    /// after the task is first polled. `on_complete` runs once after the tick
    /// for `0`. Neither callback is invoked from within `start` itself.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<T, C>(seconds: u32, period: Duration, mut on_tick: T, on_complete: C) -> Self
    where
        T: FnMut(u32) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            on_tick(seconds);

            let mut remaining = seconds;
            while remaining > 0 {
                ticker.tick().await;
                remaining -= 1;
                on_tick(remaining);
            }
            on_complete();
        });

        debug!(seconds, period_ms = period.as_millis(), "Countdown started");
        Self { task: Some(task) }
    }

    /// Stops the countdown. The completion callback will not run.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Countdown cancelled");
        }
    }

    /// Returns `true` while the countdown task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
