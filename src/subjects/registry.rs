//! Shared subscriber registry backing the hot subjects.
//!
//! The registry owns every live downstream sink plus the terminal, once
//! one has been recorded. Broadcast snapshots the live sinks and delivers
//! outside the lock, so a subscriber callback may re-enter the subject
//! (send, subscribe, cancel) without deadlocking.

use std::sync::Mutex;

use crate::core::{Completion, Sink};

pub(crate) struct Registry<T, E> {
    inner: Mutex<Inner<T, E>>,
}

struct Inner<T, E> {
    sinks: Vec<Sink<T, E>>,
    terminal: Option<Completion<E>>,
}

impl<T, E> Registry<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sinks: Vec::new(),
                terminal: None,
            }),
        }
    }

    /// Adds a sink, or hands back the terminal when the subject has
    /// already terminated (the caller replays it to the late subscriber).
    pub(crate) fn register(&self, sink: Sink<T, E>) -> Option<Completion<E>> {
        let mut inner = self.inner.lock().expect("subject registry");
        if let Some(terminal) = &inner.terminal {
            return Some(terminal.clone());
        }
        inner.sinks.push(sink);
        None
    }

    /// Delivers `value` to every live sink. Cancelled sinks are pruned
    /// while the lock is held; delivery happens outside it.
    pub(crate) fn broadcast(&self, value: T)
    where
        T: Clone,
    {
        let live = {
            let mut inner = self.inner.lock().expect("subject registry");
            if inner.terminal.is_some() {
                return;
            }
            inner.sinks.retain(|s| s.is_live());
            inner.sinks.clone()
        };
        for sink in live {
            sink.value(value.clone());
        }
    }

    /// Records the terminal and drains every sink with it. Later calls
    /// are ignored, so finish-after-fail (and vice versa) is a no-op.
    pub(crate) fn terminate(&self, completion: Completion<E>) {
        let drained = {
            let mut inner = self.inner.lock().expect("subject registry");
            if inner.terminal.is_some() {
                return;
            }
            inner.terminal = Some(completion.clone());
            std::mem::take(&mut inner.sinks)
        };
        for sink in drained {
            sink.terminate(completion.clone());
        }
    }
}
