//! # End-to-end sequencing stages.
//!
//! Stages that splice two flows into one timeline. `append` only starts its
//! second flow after the first finishes — if the first never completes, the
//! second is never even attached. `prepend` is the mirror image.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::{Completion, Flow, Sink};

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Delivers this flow to exhaustion, then `next`.
    ///
    /// An error from the first flow terminates the result; `next` is never
    /// attached in that case.
    pub fn append(&self, next: &Flow<T, E>) -> Flow<T, E> {
        let first = self.clone();
        let next = next.clone();
        Flow::from_attach(move |down: Sink<T, E>| {
            let next = next.clone();
            let fwd = down.clone();
            first.attach(Sink::new(
                down.token().clone(),
                move |v| fwd.value(v),
                move |c| match c {
                    Completion::Finished => next.attach(Sink::new(
                        down.token().clone(),
                        {
                            let down = down.clone();
                            move |v| down.value(v)
                        },
                        move |c| down.terminate(c),
                    )),
                    Completion::Failed(e) => down.fail(e),
                },
            ));
        })
    }

    /// Delivers `lead` to exhaustion, then this flow.
    pub fn prepend(&self, lead: &Flow<T, E>) -> Flow<T, E> {
        lead.append(self)
    }

    /// Delivers the literal items synchronously, then this flow.
    pub fn prepend_items(&self, items: impl IntoIterator<Item = T>) -> Flow<T, E>
    where
        T: Clone + Sync,
    {
        let items: Vec<T> = items.into_iter().collect();
        let upstream = self.clone();
        Flow::from_attach(move |down: Sink<T, E>| {
            for item in items.iter().cloned() {
                if !down.is_live() {
                    return;
                }
                down.value(item);
            }
            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| fwd.value(v),
                move |c| down.terminate(c),
            ));
        })
    }

    /// Substitutes `fallback` when the upstream completes without having
    /// delivered a single value.
    pub fn replace_empty(&self, fallback: T) -> Flow<T, E>
    where
        T: Clone + Sync,
    {
        let upstream = self.clone();
        let fallback = Arc::new(fallback);
        Flow::from_attach(move |down: Sink<T, E>| {
            let fallback = Arc::clone(&fallback);
            let emitted = Arc::new(AtomicBool::new(false));
            let saw = Arc::clone(&emitted);
            let fwd = down.clone();
            upstream.attach(Sink::new(
                down.token().clone(),
                move |v| {
                    saw.store(true, Ordering::SeqCst);
                    fwd.value(v);
                },
                move |c| match c {
                    Completion::Finished => {
                        if !emitted.load(Ordering::SeqCst) {
                            down.value(fallback.as_ref().clone());
                        }
                        down.finish();
                    }
                    Completion::Failed(e) => down.fail(e),
                },
            ));
        })
    }
}
