//! # Execution-context stages.
//!
//! A flow delivers on whatever thread the producing side signals from. The
//! two knobs here move delivery onto a [`Scheduler`](crate::Scheduler):
//!
//! - [`observe_on`](Flow::observe_on) re-routes everything downstream of
//!   its position in the chain;
//! - [`subscribe_on_scheduler`](Flow::subscribe_on_scheduler) re-routes
//!   only the final subscriber callbacks.
//!
//! Signals hop through a FIFO queue, one scheduled job per signal, so the
//! scheduler cannot reorder values and the terminal stays last.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::core::{Completion, Flow, Sink, Subscription};
use crate::ops::Signal;
use crate::scheduler::SchedulerRef;

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Moves delivery of every signal below this stage onto `scheduler`.
    pub fn observe_on(&self, scheduler: &SchedulerRef) -> Flow<T, E> {
        let upstream = self.clone();
        let scheduler = SchedulerRef::clone(scheduler);
        Flow::from_attach(move |down: Sink<T, E>| {
            let queue: Arc<Mutex<VecDeque<Signal<T, E>>>> =
                Arc::new(Mutex::new(VecDeque::new()));

            let hop = {
                let scheduler = SchedulerRef::clone(&scheduler);
                let down = down.clone();
                move |signal: Signal<T, E>| {
                    queue.lock().expect("observe_on queue").push_back(signal);
                    let job_queue = Arc::clone(&queue);
                    let job_down = down.clone();
                    scheduler.schedule(Box::new(move || {
                        let signal = job_queue.lock().expect("observe_on queue").pop_front();
                        match signal {
                            Some(Signal::Value(v)) => job_down.value(v),
                            Some(Signal::Terminal(c)) => job_down.terminate(c),
                            None => {}
                        }
                    }));
                }
            };

            let hop_terminal = hop.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| hop(Signal::Value(v)),
                move |c| hop_terminal(Signal::Terminal(c)),
            ));
        })
    }

    /// Subscribes with the terminal callbacks hopped onto `scheduler`.
    ///
    /// Unlike [`observe_on`](Flow::observe_on) placed mid-chain, this only
    /// moves the subscriber's own callbacks; stages keep running where the
    /// producing side signals.
    pub fn subscribe_on_scheduler<V, C>(
        &self,
        scheduler: &SchedulerRef,
        on_value: V,
        on_completion: C,
    ) -> Subscription
    where
        V: Fn(T) + Send + Sync + 'static,
        C: FnOnce(Completion<E>) + Send + 'static,
    {
        self.observe_on(scheduler).subscribe(on_value, on_completion)
    }
}
