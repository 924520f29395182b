//! # Per-value transformation stages.
//!
//! The simplest stage family: each value is mapped, kept, or dropped on its
//! way downstream, synchronously on whatever context the upstream delivers.
//! Errors and completion pass through untouched except where a stage's whole
//! point is to change them (`try_map`, `map_error`, `set_failure_type`).

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use crate::core::{Completion, Flow, Sink};

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Applies `f` to each value; errors and completion pass through.
    pub fn map<U, F>(&self, f: F) -> Flow<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Flow::from_attach(move |down: Sink<U, E>| {
            let f = Arc::clone(&f);
            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| fwd.value(f(v)),
                move |c| down.terminate(c),
            ));
        })
    }

    /// Applies a fallible `f`; an `Err` terminates the flow with that error
    /// and cancels the upstream.
    ///
    /// This is the throwing variant of [`compact_map`](Flow::compact_map):
    /// failure is propagated, not silently dropped.
    pub fn try_map<U, F>(&self, f: F) -> Flow<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Flow::from_attach(move |down: Sink<U, E>| {
            let f = Arc::clone(&f);
            let guard = down.token().child_token();
            let fwd = down.clone();
            let stop = guard.clone();
            upstream.attach(Sink::new(
                guard,
                move |v| match f(v) {
                    Ok(u) => fwd.value(u),
                    Err(e) => {
                        fwd.fail(e);
                        stop.cancel();
                    }
                },
                move |c| down.terminate(c),
            ));
        })
    }

    /// Drops values for which `pred` returns `false`.
    pub fn filter<F>(&self, pred: F) -> Flow<T, E>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let pred = Arc::new(pred);
        Flow::from_attach(move |down: Sink<T, E>| {
            let pred = Arc::clone(&pred);
            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| {
                    if pred(&v) {
                        fwd.value(v);
                    }
                },
                move |c| down.terminate(c),
            ));
        })
    }

    /// Applies `f` and silently drops absent results.
    ///
    /// An absent result is **not** an error: the value simply never reaches
    /// downstream and the flow keeps going.
    pub fn compact_map<U, F>(&self, f: F) -> Flow<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Flow::from_attach(move |down: Sink<U, E>| {
            let f = Arc::clone(&f);
            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| {
                    if let Some(u) = f(v) {
                        fwd.value(u);
                    }
                },
                move |c| down.terminate(c),
            ));
        })
    }

    /// Running accumulator emitting **every** intermediate result.
    ///
    /// Compare [`reduce`](Flow::reduce), which emits only the final
    /// accumulator at completion.
    pub fn scan<A, F>(&self, seed: A, f: F) -> Flow<A, E>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A, T) -> A + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Flow::from_attach(move |down: Sink<A, E>| {
            let f = Arc::clone(&f);
            let acc = Arc::new(Mutex::new(seed.clone()));
            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| {
                    let next = {
                        let mut acc = acc.lock().expect("scan state");
                        let next = f(acc.clone(), v);
                        *acc = next.clone();
                        next
                    };
                    fwd.value(next);
                },
                move |c| down.terminate(c),
            ));
        })
    }

    /// Maps the error type; values and normal completion pass through.
    pub fn map_error<E2, F>(&self, f: F) -> Flow<T, E2>
    where
        E2: Send + 'static,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Flow::from_attach(move |down: Sink<T, E2>| {
            let f = Arc::clone(&f);
            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| fwd.value(v),
                move |c: Completion<E>| down.terminate(c.map_err(|e| f(e))),
            ));
        })
    }

    /// Forwards completion and errors but never a value.
    pub fn ignore_output(&self) -> Flow<T, E> {
        let upstream = self.clone();
        Flow::from_attach(move |down: Sink<T, E>| {
            upstream.attach(Sink::new(
                down.token().clone(),
                |_v| {},
                move |c| down.terminate(c),
            ));
        })
    }
}

impl<T> Flow<T, Infallible>
where
    T: Send + 'static,
{
    /// Lifts an error-free flow into a pipeline with failure type `E`.
    ///
    /// No error can ever actually occur; this only aligns types so the flow
    /// can be combined with fallible ones.
    pub fn set_failure_type<E>(&self) -> Flow<T, E>
    where
        E: Send + 'static,
    {
        self.map_error(|never| match never {})
    }
}
