//! Primitive sources: the leaves every pipeline starts from.
//!
//! Synchronous sources ([`from_sequence`], [`just`], [`empty`], [`fail`])
//! deliver inline on the subscriber's context, before `subscribe` returns.
//! Asynchronous sources ([`deferred`], [`timer`]) deliver from a spawned
//! task or a scheduler tick.
//!
//! All sources are cold: each subscription re-runs the producer, including
//! the async trigger of a [`deferred`] flow (results are never cached).
//!
//! [`from_sequence`]: Flow::from_sequence
//! [`just`]: Flow::just
//! [`empty`]: Flow::empty
//! [`fail`]: Flow::fail
//! [`deferred`]: Flow::deferred
//! [`timer`]: Flow::timer

use std::future::Future;
use std::time::Duration;

use crate::core::Flow;
use crate::scheduler::SchedulerRef;

impl<T> Flow<T>
where
    T: Send + Sync + Clone + 'static,
{
    /// Delivers each item in order, synchronously, then completes.
    ///
    /// Delivery stops early if the subscriber cancels mid-sequence.
    ///
    /// # Example
    /// ```
    /// use flowcast::Flow;
    ///
    /// let out = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    /// let sink = std::sync::Arc::clone(&out);
    /// Flow::from_sequence(["a", "b", "c"]).subscribe_values(move |s| {
    ///     sink.lock().unwrap().push(s);
    /// });
    /// assert_eq!(*out.lock().unwrap(), vec!["a", "b", "c"]);
    /// ```
    pub fn from_sequence(items: impl IntoIterator<Item = T>) -> Self {
        let items: Vec<T> = items.into_iter().collect();
        Flow::from_attach(move |sink| {
            for item in items.iter().cloned() {
                if !sink.is_live() {
                    return;
                }
                sink.value(item);
            }
            sink.finish();
        })
    }

    /// Delivers exactly one value, synchronously, then completes.
    pub fn just(value: T) -> Self {
        Self::from_sequence([value])
    }
}

impl<T> Flow<T>
where
    T: Send + 'static,
{
    /// Completes immediately without delivering any value.
    pub fn empty() -> Self {
        Flow::from_attach(|sink| sink.finish())
    }

    /// Never delivers anything: no values, no terminal signal.
    pub fn never() -> Self {
        Flow::from_attach(|_sink| {})
    }
}

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + Sync + Clone + 'static,
{
    /// Terminates immediately with `err` and no values.
    pub fn fail(err: E) -> Self {
        Flow::from_attach(move |sink| sink.fail(err.clone()))
    }
}

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// One value (or one error) produced by an async trigger, then done.
    ///
    /// The factory runs **per subscription** — results are never cached, so
    /// two subscribers trigger the work twice. Requires an ambient tokio
    /// runtime at subscribe time.
    ///
    /// # Example
    /// ```
    /// use flowcast::Flow;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let flow: Flow<u32, String> = Flow::deferred(|| async { Ok(41 + 1) });
    /// let (tx, rx) = tokio::sync::oneshot::channel();
    /// let tx = std::sync::Mutex::new(Some(tx));
    /// flow.subscribe(
    ///     move |v| {
    ///         if let Some(tx) = tx.lock().unwrap().take() {
    ///             let _ = tx.send(v);
    ///         }
    ///     },
    ///     |_| {},
    /// );
    /// assert_eq!(rx.await.unwrap(), 42);
    /// # }
    /// ```
    pub fn deferred<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Flow::from_attach(move |sink| {
            let fut = factory();
            let cancel = sink.token().clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    res = fut => match res {
                        Ok(v) => {
                            sink.value(v);
                            sink.finish();
                        }
                        Err(e) => sink.fail(e),
                    },
                }
            });
        })
    }
}

impl Flow<u64> {
    /// Emits an incrementing tick every `period` until cancelled.
    ///
    /// Never completes on its own; the subscription's cancellation token is
    /// what stops the underlying scheduler timer.
    pub fn timer(period: Duration, scheduler: &SchedulerRef) -> Self {
        let scheduler = SchedulerRef::clone(scheduler);
        Flow::from_attach(move |sink| {
            let deliver = sink.clone();
            scheduler.schedule_periodic(
                period,
                sink.token(),
                Box::new(move |tick| deliver.value(tick)),
            );
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Completion;
    use crate::scheduler::TokioScheduler;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn collect_values<T: Send + Clone + 'static>(flow: &Flow<T>) -> Vec<T> {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&out);
        flow.subscribe_values(move |v| sink.lock().unwrap().push(v));
        let values = out.lock().unwrap().clone();
        values
    }

    #[test]
    fn test_sequence_delivers_in_order_then_completes() {
        let flow = Flow::from_sequence(1..=5);
        let done = Arc::new(AtomicU32::new(0));
        let out = Arc::new(Mutex::new(Vec::new()));
        let (sink, d) = (Arc::clone(&out), Arc::clone(&done));
        flow.subscribe(
            move |v| sink.lock().unwrap().push(v),
            move |c| {
                assert!(matches!(c, Completion::Finished));
                d.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sequence_stops_when_cancelled_mid_delivery() {
        // Cancelling from inside the value callback must cut the sequence
        // short and suppress the completion callback. The token is wired up
        // before attach so the consumer can cancel its own subscription.
        let flow = Flow::from_sequence(1..=100);
        let out: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
        let token = tokio_util::sync::CancellationToken::new();
        let sub = crate::Subscription::new(token.clone());

        let sink = Arc::clone(&out);
        let stop = sub.clone();
        flow.attach(crate::core::Sink::new(
            token,
            move |v: i32| {
                sink.lock().unwrap().push(v);
                if v == 3 {
                    stop.cancel();
                }
            },
            |_c: Completion<std::convert::Infallible>| panic!("completion after cancel"),
        ));
        assert_eq!(*out.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_just_and_empty() {
        assert_eq!(collect_values(&Flow::just(9)), vec![9]);
        assert_eq!(collect_values(&Flow::<i32>::empty()), Vec::<i32>::new());
    }

    #[test]
    fn test_fail_delivers_error_and_nothing_else() {
        let flow: Flow<i32, &'static str> = Flow::fail("boom");
        let err = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&err);
        flow.subscribe(
            |_| panic!("no values expected"),
            move |c| *sink.lock().unwrap() = Some(c),
        );
        assert_eq!(*err.lock().unwrap(), Some(Completion::Failed("boom")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_reruns_trigger_per_subscription() {
        let runs = Arc::new(AtomicU32::new(0));
        let flow: Flow<u32, &'static str> = {
            let runs = Arc::clone(&runs);
            Flow::deferred(move || {
                let runs = Arc::clone(&runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                }
            })
        };
        flow.subscribe(|_| {}, |_| {});
        flow.subscribe(|_| {}, |_| {});
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ticks_until_cancelled() {
        let scheduler: SchedulerRef = Arc::new(TokioScheduler::current());
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ticks);
        let sub = Flow::timer(Duration::from_millis(50), &scheduler)
            .subscribe_values(move |t| sink.lock().unwrap().push(t));

        tokio::time::sleep(Duration::from_millis(175)).await;
        sub.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*ticks.lock().unwrap(), vec![0, 1, 2]);
    }
}
