//! # Recovery stages.
//!
//! Stages that intercept a failure and substitute something for it: a
//! fallback flow, a fallback value, or a fresh run of the upstream.
//!
//! ## Rules
//! - `catch`: swaps the failed upstream for a handler-chosen fallback
//!   flow; values already delivered stay delivered.
//! - `replace_error`: degrades a failure to one fallback value plus
//!   finish, erasing the failure type.
//! - `retry` / `retry_backoff`: re-subscribe the upstream after a
//!   failure, up to a retry budget; the last failure passes through.
//! - `assert_no_failure`: documents that a failure is impossible; a
//!   failure at runtime is a programming error and panics.

use std::convert::Infallible;
use std::fmt::Debug;
use std::sync::Arc;

use crate::core::{Completion, Flow, Sink};
use crate::policies::BackoffPolicy;
use crate::scheduler::SchedulerRef;

/// One retry attempt: the upstream is attached on a child token so a
/// failed attempt can be re-run without disturbing the subscription root.
fn attach_attempt<T, E>(
    upstream: &Flow<T, E>,
    down: &Sink<T, E>,
    attempt: u32,
    budget: u32,
    pause: Option<(Arc<BackoffPolicy>, SchedulerRef)>,
) where
    T: Send + 'static,
    E: Send + 'static,
{
    let fwd = down.clone();
    let term = down.clone();
    let again = upstream.clone();
    upstream.attach(Sink::new(
        down.token().child_token(),
        move |v| fwd.value(v),
        move |c| match c {
            Completion::Failed(_) if attempt < budget => {
                tracing::debug!(attempt, budget, "flow attempt failed, retrying");
                match &pause {
                    None => attach_attempt(&again, &term, attempt + 1, budget, pause.clone()),
                    Some((policy, scheduler)) => {
                        let delay = policy.next(attempt);
                        let token = term.token().clone();
                        let next = pause.clone();
                        scheduler.schedule_after(
                            delay,
                            &token,
                            Box::new(move || {
                                attach_attempt(&again, &term, attempt + 1, budget, next);
                            }),
                        );
                    }
                }
            }
            other => term.terminate(other),
        },
    ));
}

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Replaces a failure with the flow the handler builds from it. The
    /// fallback may carry a different failure type.
    pub fn catch<E2, F>(&self, handler: F) -> Flow<T, E2>
    where
        E2: Send + 'static,
        F: Fn(E) -> Flow<T, E2> + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let handler = Arc::new(handler);
        Flow::from_attach(move |down: Sink<T, E2>| {
            let fwd = down.clone();
            let handler = Arc::clone(&handler);
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| fwd.value(v),
                move |c| match c {
                    Completion::Finished => down.finish(),
                    Completion::Failed(e) => handler(e).attach(down),
                },
            ));
        })
    }

    /// Degrades a failure to `fallback` followed by a normal finish.
    pub fn replace_error(&self, fallback: T) -> Flow<T, Infallible>
    where
        T: Clone + Sync,
    {
        let upstream = self.clone();
        Flow::from_attach(move |down: Sink<T, Infallible>| {
            let fwd = down.clone();
            let fallback = fallback.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| fwd.value(v),
                move |c| {
                    if let Completion::Failed(_) = c {
                        down.value(fallback);
                    }
                    down.finish();
                },
            ));
        })
    }

    /// Re-subscribes the upstream after a failure, at most `retries`
    /// times. The retry that also fails passes its error through.
    pub fn retry(&self, retries: u32) -> Flow<T, E> {
        let upstream = self.clone();
        Flow::from_attach(move |down: Sink<T, E>| {
            attach_attempt(&upstream, &down, 0, retries, None);
        })
    }

    /// [`retry`](Flow::retry) with a scheduler-driven pause between
    /// attempts, grown per [`BackoffPolicy`].
    pub fn retry_backoff(
        &self,
        retries: u32,
        policy: BackoffPolicy,
        scheduler: &SchedulerRef,
    ) -> Flow<T, E> {
        let upstream = self.clone();
        let pause = (Arc::new(policy), SchedulerRef::clone(scheduler));
        Flow::from_attach(move |down: Sink<T, E>| {
            attach_attempt(&upstream, &down, 0, retries, Some(pause.clone()));
        })
    }

    /// Erases a failure type the caller knows cannot occur.
    ///
    /// # Panics
    /// Panics with `msg` if the upstream fails anyway.
    pub fn assert_no_failure(&self, msg: &'static str) -> Flow<T, Infallible>
    where
        E: Debug,
    {
        let upstream = self.clone();
        Flow::from_attach(move |down: Sink<T, Infallible>| {
            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| fwd.value(v),
                move |c| match c {
                    Completion::Finished => down.finish(),
                    Completion::Failed(e) => panic!("{msg}: {e:?}"),
                },
            ));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::policies::JitterPolicy;
    use crate::scheduler::TokioScheduler;

    fn record<T: Send + 'static, E: Send + 'static>(
        flow: &Flow<T, E>,
    ) -> (
        Arc<Mutex<Vec<T>>>,
        Arc<Mutex<Option<Completion<E>>>>,
        crate::Subscription,
    ) {
        let out = Arc::new(Mutex::new(Vec::new()));
        let end = Arc::new(Mutex::new(None));
        let (vs, es) = (Arc::clone(&out), Arc::clone(&end));
        let sub = flow.subscribe(
            move |v| vs.lock().unwrap().push(v),
            move |c| *es.lock().unwrap() = Some(c),
        );
        (out, end, sub)
    }

    /// Emits `1, 2` then fails until `good_after` runs are spent, after
    /// which it emits `1, 2` and finishes.
    fn flaky(good_after: u32) -> Flow<u32, &'static str> {
        let runs = Arc::new(AtomicU32::new(0));
        Flow::from_attach(move |down: Sink<u32, &'static str>| {
            let run = runs.fetch_add(1, Ordering::SeqCst);
            down.value(1);
            down.value(2);
            if run < good_after {
                down.fail("flaky");
            } else {
                down.finish();
            }
        })
    }

    #[test]
    fn test_catch_switches_to_fallback_flow() {
        let (out, end, _sub) = record(
            &flaky(u32::MAX).catch(|_e| Flow::<u32>::from_sequence(vec![8, 9])),
        );
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 8, 9]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_replace_error_emits_fallback_then_finishes() {
        let (out, end, _sub) = record(&flaky(u32::MAX).replace_error(0));
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 0]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_retry_reruns_until_success() {
        let (out, end, _sub) = record(&flaky(2).retry(3));
        // Two failed runs replay their values, then the clean run.
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 1, 2, 1, 2]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_retry_exhausted_surfaces_last_error() {
        let (_out, end, _sub) = record(&flaky(u32::MAX).retry(2));
        assert_eq!(*end.lock().unwrap(), Some(Completion::Failed("flaky")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_waits_between_attempts() {
        let scheduler: SchedulerRef = Arc::new(TokioScheduler::current());
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        let (out, end, _sub) = record(&flaky(2).retry_backoff(3, policy, &scheduler));

        // First run fails immediately; retries land 100ms and 300ms in.
        assert_eq!(*out.lock().unwrap(), vec![1, 2]);
        tokio::time::sleep(Duration::from_millis(110)).await;
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 1, 2]);
        assert!(end.lock().unwrap().is_none());
        tokio::time::sleep(Duration::from_millis(210)).await;
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 1, 2, 1, 2]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    #[should_panic(expected = "statics never fail")]
    fn test_assert_no_failure_panics_on_error() {
        let flow: Flow<u32, &'static str> = flaky(u32::MAX);
        let (_out, _end, _sub) = record(&flow.assert_no_failure("statics never fail"));
    }
}
