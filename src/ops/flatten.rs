//! # Flattening stages.
//!
//! Stages that turn a flow of flows back into a flow of values.
//!
//! ## Rules
//! - `flat_map`: every inner flow runs; values interleave in arrival
//!   order; the result finishes once the outer flow and every inner flow
//!   have finished.
//! - `flat_map_bounded`: at most `max` inner flows run at once; further
//!   inners queue and start as slots free up.
//! - `switch_to_latest`: only the newest inner flow runs; a new inner
//!   cancels the previous one mid-stream.
//! - Any error, outer or inner, terminates the whole flow.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::core::{Completion, Flow, Sink};

struct FanOutState<U, E> {
    pending: VecDeque<Flow<U, E>>,
    active: usize,
    outer_done: bool,
    pumping: bool,
}

/// Starts queued inner flows while slots are free; emits the downstream
/// finish once the outer flow is done and the last inner retires.
///
/// An inner that completes synchronously re-enters this from its terminal
/// callback; the `pumping` flag turns that re-entry into a no-op and lets
/// the frame already draining pick up the state change, so a deep backlog
/// unwinds in a loop instead of on the stack.
fn pump<U, E>(state: &Arc<Mutex<FanOutState<U, E>>>, down: &Sink<U, E>, max: usize)
where
    U: Send + 'static,
    E: Send + 'static,
{
    {
        let mut st = state.lock().expect("flat_map state");
        if st.pumping {
            return;
        }
        st.pumping = true;
    }
    loop {
        let next = {
            let mut st = state.lock().expect("flat_map state");
            if st.active >= max {
                st.pumping = false;
                return;
            }
            match st.pending.pop_front() {
                Some(flow) => {
                    st.active += 1;
                    flow
                }
                None => {
                    st.pumping = false;
                    let settled = st.outer_done && st.active == 0;
                    drop(st);
                    if settled {
                        down.finish();
                    }
                    return;
                }
            }
        };
        let fwd = down.clone();
        let term = down.clone();
        let term_state = Arc::clone(state);
        next.attach(Sink::new(
            down.token().clone(),
            move |v| fwd.value(v),
            move |c| match c {
                Completion::Failed(e) => term.fail(e),
                Completion::Finished => {
                    term_state.lock().expect("flat_map state").active -= 1;
                    pump(&term_state, &term, max);
                }
            },
        ));
    }
}

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Maps each value to an inner flow and interleaves all of them.
    pub fn flat_map<U, F>(&self, f: F) -> Flow<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> Flow<U, E> + Send + Sync + 'static,
    {
        self.flat_map_bounded(usize::MAX, f)
    }

    /// [`flat_map`](Flow::flat_map) with at most `max` inner flows live at
    /// once; excess inners queue in arrival order.
    pub fn flat_map_bounded<U, F>(&self, max: usize, f: F) -> Flow<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> Flow<U, E> + Send + Sync + 'static,
    {
        fan_out(&self.map(f), max)
    }
}

/// Shared body of `flat_map` and `flat_map_bounded`.
fn fan_out<U, E>(source: &Flow<Flow<U, E>, E>, max: usize) -> Flow<U, E>
where
    U: Send + 'static,
    E: Send + 'static,
{
    let upstream: Flow<Flow<U, E>, E> = source.clone();
    Flow::from_attach(move |down: Sink<U, E>| {
        let state = Arc::new(Mutex::new(FanOutState::<U, E> {
            pending: VecDeque::new(),
            active: 0,
            outer_done: false,
            pumping: false,
        }));

        let value_state = Arc::clone(&state);
        let term_state = Arc::clone(&state);
        let down_v = down.clone();
        let down_t = down.clone();
        upstream.attach(Sink::new(
            down.token().clone(),
            move |inner| {
                value_state
                    .lock()
                    .expect("flat_map state")
                    .pending
                    .push_back(inner);
                pump(&value_state, &down_v, max);
            },
            move |c| match c {
                Completion::Failed(e) => down_t.fail(e),
                Completion::Finished => {
                    let settled = {
                        let mut st = term_state.lock().expect("flat_map state");
                        st.outer_done = true;
                        st.active == 0 && st.pending.is_empty()
                    };
                    if settled {
                        down_t.finish();
                    }
                }
            },
        ));
    })
}

struct SwitchState {
    epoch: u64,
    inner_token: Option<CancellationToken>,
    inner_live: bool,
    outer_done: bool,
}

impl<U, E> Flow<Flow<U, E>, E>
where
    U: Send + 'static,
    E: Send + 'static,
{
    /// Runs only the newest inner flow; each new inner cancels the one
    /// before it. Finishes once the outer flow is done and the last inner
    /// retires.
    pub fn switch_to_latest(&self) -> Flow<U, E> {
        let upstream = self.clone();
        Flow::from_attach(move |down: Sink<U, E>| {
            let state = Arc::new(Mutex::new(SwitchState {
                epoch: 0,
                inner_token: None,
                inner_live: false,
                outer_done: false,
            }));

            let value_state = Arc::clone(&state);
            let term_state = Arc::clone(&state);
            let down_v = down.clone();
            let down_t = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |inner: Flow<U, E>| {
                    let (epoch, token) = {
                        let mut st = value_state.lock().expect("switch state");
                        st.epoch += 1;
                        if let Some(old) = st.inner_token.take() {
                            old.cancel();
                        }
                        let token = down_v.token().child_token();
                        st.inner_token = Some(token.clone());
                        st.inner_live = true;
                        (st.epoch, token)
                    };
                    let fwd = down_v.clone();
                    let term = down_v.clone();
                    let inner_state = Arc::clone(&value_state);
                    inner.attach(Sink::new(
                        token,
                        move |v| fwd.value(v),
                        move |c| match c {
                            Completion::Failed(e) => term.fail(e),
                            Completion::Finished => {
                                let settled = {
                                    let mut st = inner_state.lock().expect("switch state");
                                    if st.epoch != epoch {
                                        // A newer inner replaced this one.
                                        return;
                                    }
                                    st.inner_live = false;
                                    st.inner_token = None;
                                    st.outer_done
                                };
                                if settled {
                                    term.finish();
                                }
                            }
                        },
                    ));
                },
                move |c| match c {
                    Completion::Failed(e) => {
                        let inner = term_state.lock().expect("switch state").inner_token.take();
                        if let Some(inner) = inner {
                            inner.cancel();
                        }
                        down_t.fail(e);
                    }
                    Completion::Finished => {
                        let idle = {
                            let mut st = term_state.lock().expect("switch state");
                            st.outer_done = true;
                            !st.inner_live
                        };
                        if idle {
                            down_t.finish();
                        }
                    }
                },
            ));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PassthroughSubject, Subscription};

    fn record<T: Send + 'static, E: Send + 'static>(
        flow: &Flow<T, E>,
    ) -> (
        Arc<Mutex<Vec<T>>>,
        Arc<Mutex<Option<Completion<E>>>>,
        Subscription,
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

    #[test]
    fn test_flat_map_expands_each_value() {
        let (out, end, _sub) = record(
            &Flow::<u32>::from_sequence(vec![1, 2, 3])
                .flat_map(|n| Flow::from_sequence(vec![n * 10, n * 10 + 1])),
        );
        assert_eq!(*out.lock().unwrap(), vec![10, 11, 20, 21, 30, 31]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_flat_map_waits_for_hanging_inner() {
        let inner: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let inner_flow = inner.flow();
        let outer: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let (out, end, _sub) =
            record(&outer.flow().flat_map(move |_| inner_flow.clone()));

        outer.send(0);
        outer.finish();
        assert!(end.lock().unwrap().is_none());
        inner.send(7);
        inner.finish();
        assert_eq!(*out.lock().unwrap(), vec![7]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_flat_map_bounded_queues_beyond_limit() {
        let gate: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let gate_flow = gate.flow();
        let started = Arc::new(Mutex::new(Vec::new()));
        let started_log = Arc::clone(&started);
        // Recording inside the inner's attach means the log fires when the
        // inner actually starts rather than when the outer value maps.
        let (out, _end, _sub) = record(
            &Flow::<u32>::from_sequence(vec![1, 2, 3])
                .set_failure_type::<()>()
                .flat_map_bounded(1, move |n| {
                    let started = Arc::clone(&started_log);
                    let upstream = gate_flow.clone();
                    Flow::from_attach(move |down: Sink<u32, ()>| {
                        started.lock().unwrap().push(n);
                        upstream.attach(down);
                    })
                }),
        );

        // Only the first inner may start while it hangs on the gate.
        assert_eq!(*started.lock().unwrap(), vec![1]);
        gate.send(99);
        assert_eq!(*out.lock().unwrap(), vec![99]);
        gate.finish();
        // The gate closing retires each inner in turn, so the remaining two
        // start and finish immediately against the already-closed subject.
        assert_eq!(*started.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_bounded_drain_survives_deep_synchronous_backlog() {
        let gate: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let gate_flow = gate.flow();
        let (out, end, _sub) = record(
            &Flow::<u32>::from_sequence(0..=10_000)
                .set_failure_type::<()>()
                .flat_map_bounded(1, move |n| {
                    if n == 0 {
                        gate_flow.clone()
                    } else {
                        Flow::just(n).set_failure_type::<()>()
                    }
                }),
        );

        // Ten thousand synchronous inners queue behind the open gate; closing
        // it drains them all from a single stack frame.
        assert!(out.lock().unwrap().is_empty());
        gate.finish();
        assert_eq!(out.lock().unwrap().len(), 10_000);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_switch_to_latest_cancels_previous_inner() {
        let first: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let second: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let outer: PassthroughSubject<Flow<u32, ()>, ()> = PassthroughSubject::new();
        let (out, end, _sub) = record(&outer.flow().switch_to_latest());

        outer.send(first.flow());
        first.send(1);
        outer.send(second.flow());
        first.send(2); // stale inner, suppressed
        second.send(10);
        outer.finish();
        second.send(11);
        second.finish();
        assert_eq!(*out.lock().unwrap(), vec![1, 10, 11]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_inner_error_terminates_the_switch() {
        let inner: PassthroughSubject<u32, &'static str> = PassthroughSubject::new();
        let outer: PassthroughSubject<Flow<u32, &'static str>, &'static str> =
            PassthroughSubject::new();
        let (_out, end, _sub) = record(&outer.flow().switch_to_latest());

        outer.send(inner.flow());
        inner.fail("inner broke");
        assert_eq!(
            *end.lock().unwrap(),
            Some(Completion::Failed("inner broke"))
        );
    }
}
