//! # Whole-flow reductions.
//!
//! Stages that fold the entire upstream into a single emission. The
//! accumulating ones (`reduce`, `count`, `min`, `max`) can only emit once
//! the upstream completes — on an endless flow they emit nothing, which is
//! by contract, not a bug. The short-circuiting ones (`contains`,
//! `all_satisfy`) emit as soon as the answer is known and cancel the
//! upstream.

use std::sync::{Arc, Mutex};

use crate::core::{Completion, Flow, Sink};

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Folds every value into an accumulator and emits only the final
    /// result when the upstream completes.
    ///
    /// Never emits on an endless flow; see [`scan`](Flow::scan) for the
    /// intermediate-emitting variant.
    pub fn reduce<A, F>(&self, seed: A, f: F) -> Flow<A, E>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A, T) -> A + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Flow::from_attach(move |down: Sink<A, E>| {
            let f = Arc::clone(&f);
            let acc = Arc::new(Mutex::new(seed.clone()));
            let state = Arc::clone(&acc);
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| {
                    let mut acc = state.lock().expect("reduce state");
                    let next = f(acc.clone(), v);
                    *acc = next;
                },
                move |c| match c {
                    Completion::Finished => {
                        let total = acc.lock().expect("reduce state").clone();
                        down.value(total);
                        down.finish();
                    }
                    Completion::Failed(e) => down.fail(e),
                },
            ));
        })
    }

    /// Emits how many values the upstream delivered, at completion.
    pub fn count(&self) -> Flow<usize, E> {
        self.reduce(0usize, |acc, _| acc + 1)
    }

    /// Emits `true` and terminates as soon as a value equals `needle`;
    /// emits `false` at completion otherwise.
    pub fn contains(&self, needle: T) -> Flow<bool, E>
    where
        T: PartialEq + Clone + Sync,
    {
        self.any_then_cancel(move |v| *v == needle, true, false)
    }

    /// Emits `false` and terminates at the first value failing `pred`;
    /// emits `true` at completion when every value passed.
    pub fn all_satisfy<F>(&self, pred: F) -> Flow<bool, E>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.any_then_cancel(move |v| !pred(v), false, true)
    }

    /// Emits the smallest value at completion.
    pub fn min(&self) -> Flow<T, E>
    where
        T: Ord + Clone,
    {
        self.best_by(|candidate, best| candidate < best)
    }

    /// Emits the largest value at completion.
    pub fn max(&self) -> Flow<T, E>
    where
        T: Ord + Clone,
    {
        self.best_by(|candidate, best| candidate > best)
    }

    /// Short-circuit helper: emit `on_hit` and cancel upstream at the first
    /// value matching `hit`, else emit `on_exhausted` at completion.
    fn any_then_cancel<F>(&self, hit: F, on_hit: bool, on_exhausted: bool) -> Flow<bool, E>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let hit = Arc::new(hit);
        Flow::from_attach(move |down: Sink<bool, E>| {
            let hit = Arc::clone(&hit);
            let guard = down.token().child_token();
            let stop = guard.clone();
            let fwd = down.clone();
            upstream.attach(Sink::new(
                guard,
                move |v| {
                    if hit(&v) {
                        fwd.value(on_hit);
                        fwd.finish();
                        stop.cancel();
                    }
                },
                move |c| match c {
                    Completion::Finished => {
                        down.value(on_exhausted);
                        down.finish();
                    }
                    Completion::Failed(e) => down.fail(e),
                },
            ));
        })
    }

    fn best_by<F>(&self, beats: F) -> Flow<T, E>
    where
        T: Clone,
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let beats = Arc::new(beats);
        Flow::from_attach(move |down: Sink<T, E>| {
            let beats = Arc::clone(&beats);
            let best: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
            let state = Arc::clone(&best);
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| {
                    let mut best = state.lock().expect("reduction state");
                    let replace = match best.as_ref() {
                        Some(current) => beats(&v, current),
                        None => true,
                    };
                    if replace {
                        *best = Some(v);
                    }
                },
                move |c| match c {
                    Completion::Finished => {
                        let winner = best.lock().expect("reduction state").take();
                        if let Some(winner) = winner {
                            down.value(winner);
                        }
                        down.finish();
                    }
                    Completion::Failed(e) => down.fail(e),
                },
            ));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn test_reduce_emits_only_final_total() {
        let flow = Flow::from_sequence(1..=4)
            .set_failure_type::<()>()
            .reduce(0, |acc, v| acc + v);
        let (values, terminal) = drain(&flow);
        assert_eq!(values, vec![10]);
        assert_eq!(terminal, Some(Completion::Finished));
    }

    #[test]
    fn test_reduce_forwards_error_without_emitting() {
        let flow: Flow<i32, &'static str> = Flow::fail("boom");
        let (values, terminal) = drain(&flow.reduce(0, |acc, v| acc + v));
        assert!(values.is_empty());
        assert_eq!(terminal, Some(Completion::Failed("boom")));
    }

    #[test]
    fn test_count_and_extremes() {
        let base = Flow::from_sequence([3, 1, 4, 1, 5]).set_failure_type::<()>();
        assert_eq!(drain(&base.count()).0, vec![5]);
        assert_eq!(drain(&base.min()).0, vec![1]);
        assert_eq!(drain(&base.max()).0, vec![5]);
    }

    #[test]
    fn test_min_of_empty_flow_just_completes() {
        let flow = Flow::<i32>::empty().set_failure_type::<()>().min();
        let (values, terminal) = drain(&flow);
        assert!(values.is_empty());
        assert_eq!(terminal, Some(Completion::Finished));
    }

    #[test]
    fn test_contains_short_circuits_upstream() {
        let upstream_seen = Arc::new(Mutex::new(0));
        let tap = Arc::clone(&upstream_seen);
        let flow = Flow::from_sequence(1..=100)
            .set_failure_type::<()>()
            .map(move |v| {
                *tap.lock().unwrap() += 1;
                v
            })
            .contains(3);
        let (values, terminal) = drain(&flow);
        assert_eq!(values, vec![true]);
        assert_eq!(terminal, Some(Completion::Finished));
        assert_eq!(*upstream_seen.lock().unwrap(), 3);
    }

    #[test]
    fn test_all_satisfy_both_outcomes() {
        let ok = Flow::from_sequence([2, 4, 6]).set_failure_type::<()>().all_satisfy(|v| v % 2 == 0);
        assert_eq!(drain(&ok).0, vec![true]);

        let bad = Flow::from_sequence([2, 3, 4]).set_failure_type::<()>().all_satisfy(|v| v % 2 == 0);
        assert_eq!(drain(&bad).0, vec![false]);
    }
}
