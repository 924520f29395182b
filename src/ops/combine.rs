//! # Combining stages.
//!
//! Fan-in over several upstreams feeding one downstream sink.
//!
//! ```text
//!  upstream A ──┐
//!  upstream B ──┼──▶ [ merge | zip | combine_latest ] ──▶ downstream
//!  upstream C ──┘
//! ```
//!
//! ## Rules
//! - `merge`: interleaves values as they arrive; finishes once every
//!   upstream has finished; the first error terminates the whole flow.
//! - Every input attaches on a child token that the stage cancels at its
//!   own terminal, so no sibling upstream keeps working after an error.
//! - `zip`: pairs values positionally through per-side queues; finishes as
//!   soon as one side can no longer contribute a pair, cancelling the
//!   other.
//! - `combine_latest`: emits the latest pair on every update once each
//!   side has produced at least one value; finishes when both sides have.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::{Completion, Flow, Sink};

struct ZipState<A, B> {
    left: VecDeque<A>,
    right: VecDeque<B>,
    left_done: bool,
    right_done: bool,
}

impl<A, B> ZipState<A, B> {
    /// A side whose queue is drained and whose upstream has finished can
    /// never contribute again, so no further pair is possible.
    fn exhausted(&self) -> bool {
        (self.left_done && self.left.is_empty()) || (self.right_done && self.right.is_empty())
    }
}

struct LatestState<A, B> {
    left: Option<A>,
    right: Option<B>,
    open: usize,
}

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Interleaves any number of upstreams into one flow.
    pub fn merge(flows: Vec<Flow<T, E>>) -> Flow<T, E> {
        Flow::from_attach(move |down: Sink<T, E>| {
            if flows.is_empty() {
                down.finish();
                return;
            }
            let open = Arc::new(AtomicUsize::new(flows.len()));
            // One guard over every input, so the first error (or the last
            // finish) detaches the surviving siblings.
            let guard = down.token().child_token();
            for flow in &flows {
                let fwd = down.clone();
                let term = down.clone();
                let open = Arc::clone(&open);
                let term_guard = guard.clone();
                flow.attach(Sink::new(
                    guard.clone(),
                    move |v| fwd.value(v),
                    move |c| match c {
                        Completion::Failed(e) => {
                            term_guard.cancel();
                            term.fail(e);
                        }
                        Completion::Finished => {
                            if open.fetch_sub(1, Ordering::AcqRel) == 1 {
                                term_guard.cancel();
                                term.finish();
                            }
                        }
                    },
                ));
            }
        })
    }

    /// Merges this flow with one other.
    pub fn merge_with(&self, other: &Flow<T, E>) -> Flow<T, E> {
        Flow::merge(vec![self.clone(), other.clone()])
    }

    /// Pairs values positionally: the n-th output is the n-th value of
    /// each side. Unmatched values wait in a queue.
    pub fn zip<U>(&self, other: &Flow<U, E>) -> Flow<(T, U), E>
    where
        U: Send + 'static,
    {
        let a = self.clone();
        let b = other.clone();
        Flow::from_attach(move |down: Sink<(T, U), E>| {
            let state = Arc::new(Mutex::new(ZipState::<T, U> {
                left: VecDeque::new(),
                right: VecDeque::new(),
                left_done: false,
                right_done: false,
            }));
            let left_guard = down.token().child_token();
            let right_guard = down.token().child_token();

            let settle = {
                let left_guard = left_guard.clone();
                let right_guard = right_guard.clone();
                Arc::new(move |down: &Sink<(T, U), E>, c: Completion<E>| {
                    left_guard.cancel();
                    right_guard.cancel();
                    down.terminate(c);
                })
            };

            {
                let state = Arc::clone(&state);
                let term_state = Arc::clone(&state);
                let down_v = down.clone();
                let down_t = down.clone();
                let settle_v = Arc::clone(&settle);
                let settle_t = Arc::clone(&settle);
                a.attach(Sink::new(
                    left_guard,
                    move |v| {
                        let (pair, done) = {
                            let mut st = state.lock().expect("zip state");
                            st.left.push_back(v);
                            let pair = if !st.right.is_empty() {
                                Some((
                                    st.left.pop_front().expect("left queued"),
                                    st.right.pop_front().expect("right queued"),
                                ))
                            } else {
                                None
                            };
                            (pair, st.exhausted())
                        };
                        if let Some(pair) = pair {
                            down_v.value(pair);
                        }
                        if done {
                            settle_v(&down_v, Completion::Finished);
                        }
                    },
                    move |c| match c {
                        Completion::Failed(e) => settle_t(&down_t, Completion::Failed(e)),
                        Completion::Finished => {
                            let done = {
                                let mut st = term_state.lock().expect("zip state");
                                st.left_done = true;
                                st.exhausted()
                            };
                            if done {
                                settle_t(&down_t, Completion::Finished);
                            }
                        }
                    },
                ));
            }
            {
                let state = Arc::clone(&state);
                let term_state = Arc::clone(&state);
                let down_v = down.clone();
                let down_t = down;
                let settle_v = Arc::clone(&settle);
                let settle_t = settle;
                b.attach(Sink::new(
                    right_guard,
                    move |v| {
                        let (pair, done) = {
                            let mut st = state.lock().expect("zip state");
                            st.right.push_back(v);
                            let pair = if !st.left.is_empty() {
                                Some((
                                    st.left.pop_front().expect("left queued"),
                                    st.right.pop_front().expect("right queued"),
                                ))
                            } else {
                                None
                            };
                            (pair, st.exhausted())
                        };
                        if let Some(pair) = pair {
                            down_v.value(pair);
                        }
                        if done {
                            settle_v(&down_v, Completion::Finished);
                        }
                    },
                    move |c| match c {
                        Completion::Failed(e) => settle_t(&down_t, Completion::Failed(e)),
                        Completion::Finished => {
                            let done = {
                                let mut st = term_state.lock().expect("zip state");
                                st.right_done = true;
                                st.exhausted()
                            };
                            if done {
                                settle_t(&down_t, Completion::Finished);
                            }
                        }
                    },
                ));
            }
        })
    }

    /// Three-way positional pairing, built on [`zip`](Flow::zip).
    pub fn zip3<U, V>(&self, b: &Flow<U, E>, c: &Flow<V, E>) -> Flow<(T, U, V), E>
    where
        U: Send + 'static,
        V: Send + 'static,
    {
        self.zip(b).zip(c).map(|((a, b), c)| (a, b, c))
    }

    /// Emits the latest value of each side on every update, once both
    /// sides have produced at least one value.
    pub fn combine_latest<U>(&self, other: &Flow<U, E>) -> Flow<(T, U), E>
    where
        T: Clone + Sync,
        U: Clone + Send + Sync + 'static,
    {
        let a = self.clone();
        let b = other.clone();
        Flow::from_attach(move |down: Sink<(T, U), E>| {
            let state = Arc::new(Mutex::new(LatestState::<T, U> {
                left: None,
                right: None,
                open: 2,
            }));
            let guard = down.token().child_token();

            {
                let state = Arc::clone(&state);
                let term_state = Arc::clone(&state);
                let down_v = down.clone();
                let down_t = down.clone();
                let term_guard = guard.clone();
                a.attach(Sink::new(
                    guard.clone(),
                    move |v| {
                        let pair = {
                            let mut st = state.lock().expect("combine_latest state");
                            st.left = Some(v);
                            match (&st.left, &st.right) {
                                (Some(l), Some(r)) => Some((l.clone(), r.clone())),
                                _ => None,
                            }
                        };
                        if let Some(pair) = pair {
                            down_v.value(pair);
                        }
                    },
                    move |c| match c {
                        Completion::Failed(e) => {
                            term_guard.cancel();
                            down_t.fail(e);
                        }
                        Completion::Finished => {
                            let all_done = {
                                let mut st = term_state.lock().expect("combine_latest state");
                                st.open -= 1;
                                st.open == 0
                            };
                            if all_done {
                                term_guard.cancel();
                                down_t.finish();
                            }
                        }
                    },
                ));
            }
            {
                let state = Arc::clone(&state);
                let term_state = Arc::clone(&state);
                let down_v = down.clone();
                let down_t = down;
                let term_guard = guard.clone();
                b.attach(Sink::new(
                    guard,
                    move |v| {
                        let pair = {
                            let mut st = state.lock().expect("combine_latest state");
                            st.right = Some(v);
                            match (&st.left, &st.right) {
                                (Some(l), Some(r)) => Some((l.clone(), r.clone())),
                                _ => None,
                            }
                        };
                        if let Some(pair) = pair {
                            down_v.value(pair);
                        }
                    },
                    move |c| match c {
                        Completion::Failed(e) => {
                            term_guard.cancel();
                            down_t.fail(e);
                        }
                        Completion::Finished => {
                            let all_done = {
                                let mut st = term_state.lock().expect("combine_latest state");
                                st.open -= 1;
                                st.open == 0
                            };
                            if all_done {
                                term_guard.cancel();
                                down_t.finish();
                            }
                        }
                    },
                ));
            }
        })
    }

    /// Three-way [`combine_latest`](Flow::combine_latest).
    pub fn combine_latest3<U, V>(&self, b: &Flow<U, E>, c: &Flow<V, E>) -> Flow<(T, U, V), E>
    where
        T: Clone + Sync,
        U: Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.combine_latest(b)
            .combine_latest(c)
            .map(|((a, b), c)| (a, b, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PassthroughSubject;

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

    #[test]
    fn test_merge_interleaves_and_finishes_after_all() {
        let a: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let b: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let (out, end, _sub) = record(&a.flow().merge_with(&b.flow()));

        a.send(1);
        b.send(10);
        a.send(2);
        a.finish();
        assert!(end.lock().unwrap().is_none());
        b.send(11);
        b.finish();
        assert_eq!(*out.lock().unwrap(), vec![1, 10, 2, 11]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_merge_error_cuts_off_remaining_values() {
        let a: PassthroughSubject<u32, &'static str> = PassthroughSubject::new();
        let b: PassthroughSubject<u32, &'static str> = PassthroughSubject::new();
        let (out, end, _sub) = record(&a.flow().merge_with(&b.flow()));

        a.send(1);
        b.fail("boom");
        a.send(2);
        assert_eq!(*out.lock().unwrap(), vec![1]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Failed("boom")));
    }

    #[test]
    fn test_merge_error_detaches_surviving_upstream() {
        let a: PassthroughSubject<u32, &'static str> = PassthroughSubject::new();
        let b: PassthroughSubject<u32, &'static str> = PassthroughSubject::new();
        let upstream_work = Arc::new(AtomicUsize::new(0));
        let tap = Arc::clone(&upstream_work);
        let counted = a.flow().map(move |v| {
            tap.fetch_add(1, Ordering::SeqCst);
            v
        });
        let (_out, end, _sub) = record(&counted.merge_with(&b.flow()));

        a.send(1);
        b.fail("boom");
        // The surviving side is detached, so its stage work stops too.
        a.send(2);
        a.send(3);
        assert_eq!(upstream_work.load(Ordering::SeqCst), 1);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Failed("boom")));
    }

    #[test]
    fn test_zip_error_detaches_the_other_side() {
        let a: PassthroughSubject<u32, &'static str> = PassthroughSubject::new();
        let b: PassthroughSubject<u32, &'static str> = PassthroughSubject::new();
        let upstream_work = Arc::new(AtomicUsize::new(0));
        let tap = Arc::clone(&upstream_work);
        let counted = b.flow().map(move |v| {
            tap.fetch_add(1, Ordering::SeqCst);
            v
        });
        let (_out, end, _sub) = record(&a.flow().zip(&counted));

        a.fail("boom");
        b.send(1);
        b.send(2);
        assert_eq!(upstream_work.load(Ordering::SeqCst), 0);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Failed("boom")));
    }

    #[test]
    fn test_combine_latest_error_detaches_the_other_side() {
        let a: PassthroughSubject<u32, &'static str> = PassthroughSubject::new();
        let b: PassthroughSubject<u32, &'static str> = PassthroughSubject::new();
        let upstream_work = Arc::new(AtomicUsize::new(0));
        let tap = Arc::clone(&upstream_work);
        let counted = b.flow().map(move |v| {
            tap.fetch_add(1, Ordering::SeqCst);
            v
        });
        let (_out, end, _sub) = record(&a.flow().combine_latest(&counted));

        b.send(1);
        a.fail("boom");
        b.send(2);
        assert_eq!(upstream_work.load(Ordering::SeqCst), 1);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Failed("boom")));
    }

    #[test]
    fn test_zip_pairs_positionally_and_stops_at_shorter_side() {
        let (out, end, _sub) = record(
            &Flow::<u32>::from_sequence(vec![1, 2, 3, 4, 5])
                .zip(&Flow::from_sequence(vec!["a", "b", "c"])),
        );
        assert_eq!(*out.lock().unwrap(), vec![(1, "a"), (2, "b"), (3, "c")]);
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_zip_queues_the_faster_side() {
        let a: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let b: PassthroughSubject<&'static str, ()> = PassthroughSubject::new();
        let (out, _end, _sub) = record(&a.flow().zip(&b.flow()));

        a.send(1);
        a.send(2);
        assert!(out.lock().unwrap().is_empty());
        b.send("x");
        b.send("y");
        assert_eq!(*out.lock().unwrap(), vec![(1, "x"), (2, "y")]);
    }

    #[test]
    fn test_combine_latest_emits_on_each_update_once_primed() {
        let a: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let b: PassthroughSubject<&'static str, ()> = PassthroughSubject::new();
        let (out, end, _sub) = record(&a.flow().combine_latest(&b.flow()));

        a.send(1);
        assert!(out.lock().unwrap().is_empty());
        b.send("x");
        a.send(2);
        b.send("y");
        assert_eq!(
            *out.lock().unwrap(),
            vec![(1, "x"), (2, "x"), (2, "y")]
        );
        a.finish();
        assert!(end.lock().unwrap().is_none());
        b.finish();
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_zip3_builds_triples() {
        let (out, _end, _sub) = record(&Flow::<u32>::from_sequence(vec![1, 2]).zip3(
            &Flow::from_sequence(vec!["a", "b"]),
            &Flow::from_sequence(vec![true, false]),
        ));
        assert_eq!(
            *out.lock().unwrap(),
            vec![(1, "a", true), (2, "b", false)]
        );
    }
}
