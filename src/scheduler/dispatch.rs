//! # Tokio-backed dispatch scheduler.
//!
//! [`TokioScheduler`] captures a [`runtime::Handle`] at construction and
//! dispatches all work onto that runtime:
//!
//! - immediate jobs go through a dedicated worker task fed by an unbounded
//!   channel, which keeps them FIFO (plain `spawn` per job would not);
//! - delayed jobs are spawned tasks racing `sleep` against the cancel token;
//! - periodic jobs are spawned tasks ticking an [`interval`].
//!
//! On a multi-threaded runtime this is a multi-threaded dispatch scheduler;
//! on a `current_thread` runtime everything runs cooperatively on the one
//! driver thread. Stage wiring is identical in both cases.
//!
//! Virtual time: under `tokio::time::pause` (test-util) sleeps and intervals
//! auto-advance, which makes debounce/throttle/collect tests deterministic.
//!
//! [`interval`]: tokio::time::interval_at

use std::time::Duration;

use tokio::runtime;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::{Job, Scheduler, TickJob};

/// Scheduler dispatching onto a captured tokio runtime handle.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: runtime::Handle,
    ordered: mpsc::UnboundedSender<Job>,
}

impl TokioScheduler {
    /// Captures the current runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime, like
    /// [`runtime::Handle::current`].
    pub fn current() -> Self {
        Self::new(runtime::Handle::current())
    }

    /// Builds a scheduler dispatching onto `handle`.
    pub fn new(handle: runtime::Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
        });
        Self {
            handle,
            ordered: tx,
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, job: Job) {
        // Worker gone means the runtime is shutting down; late jobs are moot.
        if self.ordered.send(job).is_err() {
            tracing::debug!("scheduled job dropped: runtime worker closed");
        }
    }

    fn schedule_after(&self, delay: Duration, cancel: &CancellationToken, job: Job) {
        let cancel = cancel.clone();
        self.handle.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = time::sleep(delay) => job(),
            }
        });
    }

    fn schedule_periodic(&self, period: Duration, cancel: &CancellationToken, mut job: TickJob) {
        let cancel = cancel.clone();
        self.handle.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            let mut tick = 0u64;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        job(tick);
                        tick += 1;
                    }
                }
            }
        });
    }
}
