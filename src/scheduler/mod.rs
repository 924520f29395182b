//! Scheduler abstraction for delayed, periodic and rescheduled work.
//!
//! Time-aware stages (`timer`, `debounce`, `throttle`, `delay`, `timeout`,
//! `collect_by_time_or_count`) and the context-hop stages (`observe_on`,
//! `subscribe_on_scheduler`) are written against the [`Scheduler`] trait and are
//! agnostic to which implementation drives them.
//!
//! ## Implementations
//! - [`TokioScheduler`] — dispatches onto a captured tokio runtime handle.
//!   On a multi-threaded runtime this is the multi-threaded dispatch
//!   scheduler; on a `current_thread` runtime it degrades gracefully to
//!   cooperative single-threaded execution.
//! - [`EventLoopScheduler`] — a dedicated thread running a timer heap and a
//!   condvar loop: a self-contained single-threaded cooperative event loop
//!   with no runtime dependency.
//!
//! ## Cancellation
//! Delayed and periodic jobs are armed with a [`CancellationToken`]
//! (typically a child of the subscription's root token). Cancelling the
//! token prevents the job from running; the tokio implementation drops the
//! pending timer immediately, the event loop skips the entry when it comes
//! due. Either way a cancelled subscription never observes a late callback,
//! because sink delivery re-checks the token as well.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod dispatch;
mod event_loop;

pub use dispatch::TokioScheduler;
pub use event_loop::EventLoopScheduler;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// One-shot unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Repeated unit of work; receives the 0-based tick counter.
pub type TickJob = Box<dyn FnMut(u64) + Send + 'static>;

/// Execution context capable of immediate, delayed and periodic callbacks.
///
/// Implementations must preserve FIFO order for [`schedule`](Scheduler::schedule)
/// jobs submitted from one caller; delayed jobs fire no earlier than their
/// deadline; periodic jobs tick at a fixed period until cancelled.
pub trait Scheduler: Send + Sync + 'static {
    /// Runs `job` on this scheduler's context as soon as possible.
    ///
    /// Jobs submitted in order from one thread run in that order.
    fn schedule(&self, job: Job);

    /// Runs `job` once after `delay`, unless `cancel` fires first.
    fn schedule_after(&self, delay: Duration, cancel: &CancellationToken, job: Job);

    /// Runs `job` every `period` (first tick one period from now) until
    /// `cancel` fires.
    fn schedule_periodic(&self, period: Duration, cancel: &CancellationToken, job: TickJob);
}

/// Shared scheduler handle, the form stage methods accept.
pub type SchedulerRef = Arc<dyn Scheduler>;
