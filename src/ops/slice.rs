//! # Slicing and deduplication stages.
//!
//! Stages that pass through a window of the upstream: leading or trailing
//! elements, count-bounded or gated by a second flow, plus neighbor
//! deduplication.
//!
//! ## Rules
//! - `first*` and `prefix*` terminate downstream **and cancel upstream** the
//!   moment their window closes.
//! - `last*` must see the upstream complete before it can emit anything.
//! - Gate flows (`prefix_until`, `skip_until`) are observed for their first
//!   value only and then cancelled; their completion or later values are
//!   irrelevant.
//! - `remove_duplicates` compares against the previously **emitted** value,
//!   not the whole history.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::{Completion, Flow, Sink};

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Emits the first value, then completes and cancels the upstream.
    pub fn first(&self) -> Flow<T, E> {
        self.first_where(|_| true)
    }

    /// Emits the first value matching `pred`, then completes and cancels
    /// the upstream.
    pub fn first_where<F>(&self, pred: F) -> Flow<T, E>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let pred = Arc::new(pred);
        Flow::from_attach(move |down: Sink<T, E>| {
            let pred = Arc::clone(&pred);
            let guard = down.token().child_token();
            let stop = guard.clone();
            let fwd = down.clone();
            upstream.attach(Sink::new(
                guard,
                move |v| {
                    if pred(&v) {
                        fwd.value(v);
                        fwd.finish();
                        stop.cancel();
                    }
                },
                move |c| down.terminate(c),
            ));
        })
    }

    /// Emits the final value once the upstream completes.
    pub fn last(&self) -> Flow<T, E>
    where
        T: Clone,
    {
        self.last_where(|_| true)
    }

    /// Emits the final value matching `pred` once the upstream completes.
    pub fn last_where<F>(&self, pred: F) -> Flow<T, E>
    where
        T: Clone,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let pred = Arc::new(pred);
        Flow::from_attach(move |down: Sink<T, E>| {
            let pred = Arc::clone(&pred);
            let held: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
            let state = Arc::clone(&held);
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| {
                    if pred(&v) {
                        *state.lock().expect("last state") = Some(v);
                    }
                },
                move |c| match c {
                    Completion::Finished => {
                        let last = held.lock().expect("last state").take();
                        if let Some(last) = last {
                            down.value(last);
                        }
                        down.finish();
                    }
                    Completion::Failed(e) => down.fail(e),
                },
            ));
        })
    }

    /// Passes the first `n` values, then completes and cancels the
    /// upstream. `prefix(0)` completes immediately.
    pub fn prefix(&self, n: usize) -> Flow<T, E> {
        let upstream = self.clone();
        Flow::from_attach(move |down: Sink<T, E>| {
            if n == 0 {
                down.finish();
                return;
            }
            let taken = Arc::new(AtomicUsize::new(0));
            let guard = down.token().child_token();
            let stop = guard.clone();
            let fwd = down.clone();
            upstream.attach(Sink::new(
                guard,
                move |v| {
                    let seen = taken.fetch_add(1, Ordering::SeqCst) + 1;
                    if seen <= n {
                        fwd.value(v);
                    }
                    if seen == n {
                        fwd.finish();
                        stop.cancel();
                    }
                },
                move |c| down.terminate(c),
            ));
        })
    }

    /// Passes values until `gate` produces its first value, then completes
    /// and cancels both the upstream and the gate.
    pub fn prefix_until<O>(&self, gate: &Flow<O, E>) -> Flow<T, E>
    where
        O: Send + 'static,
    {
        let upstream = self.clone();
        let gate = gate.clone();
        Flow::from_attach(move |down: Sink<T, E>| {
            let up_guard = down.token().child_token();
            let gate_guard = down.token().child_token();

            let fwd = down.clone();
            let stop_up = up_guard.clone();
            let stop_gate = gate_guard.clone();
            gate.attach(Sink::new(
                gate_guard,
                move |_trigger| {
                    fwd.finish();
                    stop_up.cancel();
                    stop_gate.cancel();
                },
                // A gate that ends without a value leaves the window open;
                // a gate error is still an error of the whole pipeline.
                {
                    let down = down.clone();
                    move |c| {
                        if let Completion::Failed(e) = c {
                            down.fail(e);
                        }
                    }
                },
            ));

            let fwd = down.clone();
            upstream.attach(Sink::new(
                up_guard,
                move |v| fwd.value(v),
                move |c| down.terminate(c),
            ));
        })
    }

    /// Suppresses the first `n` values.
    pub fn skip(&self, n: usize) -> Flow<T, E> {
        let upstream = self.clone();
        Flow::from_attach(move |down: Sink<T, E>| {
            let seen = Arc::new(AtomicUsize::new(0));
            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| {
                    if seen.fetch_add(1, Ordering::SeqCst) >= n {
                        fwd.value(v);
                    }
                },
                move |c| down.terminate(c),
            ));
        })
    }

    /// Suppresses values until `gate` produces its first value; the gate is
    /// then cancelled and its later values are ignored.
    pub fn skip_until<O>(&self, gate: &Flow<O, E>) -> Flow<T, E>
    where
        O: Send + 'static,
    {
        let upstream = self.clone();
        let gate = gate.clone();
        Flow::from_attach(move |down: Sink<T, E>| {
            let open = Arc::new(AtomicBool::new(false));
            let gate_guard = down.token().child_token();

            let unlocked = Arc::clone(&open);
            let stop_gate = gate_guard.clone();
            gate.attach(Sink::new(
                gate_guard,
                move |_trigger| {
                    unlocked.store(true, Ordering::SeqCst);
                    stop_gate.cancel();
                },
                {
                    let down = down.clone();
                    move |c| {
                        if let Completion::Failed(e) = c {
                            down.fail(e);
                        }
                    }
                },
            ));

            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| {
                    if open.load(Ordering::SeqCst) {
                        fwd.value(v);
                    }
                },
                move |c| down.terminate(c),
            ));
        })
    }

    /// Drops values equal to the immediately preceding emitted value.
    pub fn remove_duplicates(&self) -> Flow<T, E>
    where
        T: PartialEq + Clone,
    {
        self.remove_duplicates_by(|a, b| a == b)
    }

    /// Drops values the comparator deems equal to the previous emission.
    pub fn remove_duplicates_by<F>(&self, eq: F) -> Flow<T, E>
    where
        T: Clone,
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let eq = Arc::new(eq);
        Flow::from_attach(move |down: Sink<T, E>| {
            let eq = Arc::clone(&eq);
            let previous: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| {
                    let emit = {
                        let mut previous = previous.lock().expect("dedup state");
                        let duplicate = previous
                            .as_ref()
                            .map(|prev| eq(prev, &v))
                            .unwrap_or(false);
                        if !duplicate {
                            *previous = Some(v.clone());
                        }
                        !duplicate
                    };
                    if emit {
                        fwd.value(v);
                    }
                },
                move |c| down.terminate(c),
            ));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PassthroughSubject;
    use std::sync::Mutex;

    fn drain<T, E>(flow: &Flow<T, E>) -> (Vec<T>, Option<Completion<E>>)
    where
        T: Send + Clone + 'static,
        E: Send + Clone + 'static,
    {
        let out = Arc::new(Mutex::new(Vec::new()));
        let end = Arc::new(Mutex::new(None));
        let (vs, es) = (Arc::clone(&out), Arc::clone(&end));
        flow.subscribe(
            move |v| vs.lock().unwrap().push(v),
            move |c| *es.lock().unwrap() = Some(c),
        );
        let values = out.lock().unwrap().clone();
        let terminal = end.lock().unwrap().clone();
        (values, terminal)
    }

    #[test]
    fn test_first_cancels_upstream_after_one() {
        let pulled = Arc::new(Mutex::new(0));
        let tap = Arc::clone(&pulled);
        let flow = Flow::from_sequence(1..=50)
            .set_failure_type::<()>()
            .map(move |v| {
                *tap.lock().unwrap() += 1;
                v
            })
            .first();
        let (values, terminal) = drain(&flow);
        assert_eq!(values, vec![1]);
        assert_eq!(terminal, Some(Completion::Finished));
        assert_eq!(*pulled.lock().unwrap(), 1);
    }

    #[test]
    fn test_first_where_and_last_where() {
        let base = Flow::from_sequence(1..=9).set_failure_type::<()>();
        assert_eq!(drain(&base.first_where(|v| v % 4 == 0)).0, vec![4]);
        assert_eq!(drain(&base.last_where(|v| v % 4 == 0)).0, vec![8]);
    }

    #[test]
    fn test_last_waits_for_completion() {
        let subject: PassthroughSubject<i32, ()> = PassthroughSubject::new();
        let flow = subject.flow().last();
        let (out, end) = (
            Arc::new(Mutex::new(Vec::new())),
            Arc::new(Mutex::new(None)),
        );
        let (vs, es) = (Arc::clone(&out), Arc::clone(&end));
        flow.subscribe(
            move |v| vs.lock().unwrap().push(v),
            move |c| *es.lock().unwrap() = Some(c),
        );

        subject.send(1);
        subject.send(2);
        assert!(out.lock().unwrap().is_empty());
        subject.finish();
        assert_eq!(*out.lock().unwrap(), vec![2]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_prefix_bounds_and_zero() {
        let base = Flow::from_sequence(1..=10).set_failure_type::<()>();
        let (values, terminal) = drain(&base.prefix(3));
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(terminal, Some(Completion::Finished));

        let (values, terminal) = drain(&base.prefix(0));
        assert!(values.is_empty());
        assert_eq!(terminal, Some(Completion::Finished));
    }

    #[test]
    fn test_skip_suppresses_leading_values() {
        let base = Flow::from_sequence(1..=6).set_failure_type::<()>();
        assert_eq!(drain(&base.skip(4)).0, vec![5, 6]);
        assert_eq!(drain(&base.skip(0)).0, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_skip_until_gate_opens_once() {
        let main: PassthroughSubject<i32, ()> = PassthroughSubject::new();
        let gate: PassthroughSubject<&'static str, ()> = PassthroughSubject::new();
        let out = Arc::new(Mutex::new(Vec::new()));
        let vs = Arc::clone(&out);
        main.flow()
            .skip_until(&gate.flow())
            .subscribe(move |v| vs.lock().unwrap().push(v), |_| {});

        main.send(1);
        main.send(2);
        gate.send("open");
        main.send(3);
        gate.send("ignored");
        main.send(4);
        assert_eq!(*out.lock().unwrap(), vec![3, 4]);
    }

    #[test]
    fn test_prefix_until_closes_on_gate_output() {
        let main: PassthroughSubject<i32, ()> = PassthroughSubject::new();
        let gate: PassthroughSubject<(), ()> = PassthroughSubject::new();
        let out = Arc::new(Mutex::new(Vec::new()));
        let end = Arc::new(Mutex::new(None));
        let (vs, es) = (Arc::clone(&out), Arc::clone(&end));
        main.flow()
            .prefix_until(&gate.flow())
            .subscribe(
                move |v| vs.lock().unwrap().push(v),
                move |c| *es.lock().unwrap() = Some(c),
            );

        main.send(1);
        main.send(2);
        gate.send(());
        main.send(3);
        assert_eq!(*out.lock().unwrap(), vec![1, 2]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_remove_duplicates_only_adjacent() {
        let flow = Flow::from_sequence([1, 1, 2, 2, 2, 1, 3, 3])
            .set_failure_type::<()>()
            .remove_duplicates();
        assert_eq!(drain(&flow).0, vec![1, 2, 1, 3]);
    }
}
