//! # Passthrough subject.
//!
//! A hot entry point into a flow chain: values pushed with
//! [`PassthroughSubject::send`] multicast to every current subscriber and
//! are gone. Nothing is retained, late subscribers start empty.
//!
//! ```text
//!  send(v) ──▶ [ registry ] ──▶ subscriber A
//!                          └──▶ subscriber B
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use crate::core::{Completion, Flow, Sink};
use crate::subjects::registry::Registry;

pub struct PassthroughSubject<T, E = Infallible> {
    registry: Arc<Registry<T, E>>,
}

impl<T, E> PassthroughSubject<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
        }
    }

    /// Multicasts `value` to every live subscriber. Dropped silently once
    /// the subject has terminated.
    pub fn send(&self, value: T)
    where
        T: Clone,
    {
        self.registry.broadcast(value);
    }

    /// Terminates every subscriber with a finish. Idempotent.
    pub fn finish(&self) {
        self.registry.terminate(Completion::Finished);
    }

    /// Terminates every subscriber with `error`. Idempotent.
    pub fn fail(&self, error: E) {
        self.registry.terminate(Completion::Failed(error));
    }

    /// A cold handle onto this subject; each subscription registers with
    /// the shared registry. Subscribing after termination replays just the
    /// terminal.
    pub fn flow(&self) -> Flow<T, E> {
        let registry = Arc::clone(&self.registry);
        Flow::from_attach(move |sink: Sink<T, E>| {
            if let Some(terminal) = registry.register(sink.clone()) {
                sink.terminate(terminal);
            }
        })
    }
}

impl<T, E> Default for PassthroughSubject<T, E>
where
    T: Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for PassthroughSubject<T, E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_multicasts_to_every_subscriber() {
        let subject: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let a = Arc::new(Mutex::new(Vec::new()));
        let b = Arc::new(Mutex::new(Vec::new()));
        let (pa, pb) = (Arc::clone(&a), Arc::clone(&b));
        let _sa = subject
            .flow()
            .subscribe(move |v| pa.lock().unwrap().push(v), |_| {});
        let _sb = subject
            .flow()
            .subscribe(move |v| pb.lock().unwrap().push(v), |_| {});

        subject.send(1);
        subject.send(2);
        assert_eq!(*a.lock().unwrap(), vec![1, 2]);
        assert_eq!(*b.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_values() {
        let subject: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        subject.send(1);
        let got = Arc::new(Mutex::new(Vec::new()));
        let tap = Arc::clone(&got);
        let _sub = subject
            .flow()
            .subscribe(move |v| tap.lock().unwrap().push(v), |_| {});
        subject.send(2);
        assert_eq!(*got.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_subscribe_after_failure_gets_only_the_terminal() {
        let subject: PassthroughSubject<u32, &'static str> = PassthroughSubject::new();
        subject.fail("gone");
        let end = Arc::new(Mutex::new(None));
        let tap = Arc::clone(&end);
        let _sub = subject.flow().subscribe(
            |_| panic!("no values after termination"),
            move |c| *tap.lock().unwrap() = Some(c),
        );
        assert_eq!(*end.lock().unwrap(), Some(Completion::Failed("gone")));
    }

    #[test]
    fn test_finish_then_fail_keeps_first_terminal() {
        let subject: PassthroughSubject<u32, &'static str> = PassthroughSubject::new();
        let end = Arc::new(Mutex::new(None));
        let tap = Arc::clone(&end);
        let _sub = subject
            .flow()
            .subscribe(|_| {}, move |c| *tap.lock().unwrap() = Some(c));
        subject.finish();
        subject.fail("too late");
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }

    #[test]
    fn test_cancelled_subscriber_is_pruned() {
        let subject: PassthroughSubject<u32, ()> = PassthroughSubject::new();
        let got = Arc::new(Mutex::new(Vec::new()));
        let tap = Arc::clone(&got);
        let sub = subject
            .flow()
            .subscribe(move |v| tap.lock().unwrap().push(v), |_| {});
        subject.send(1);
        sub.cancel();
        subject.send(2);
        assert_eq!(*got.lock().unwrap(), vec![1]);
    }
}
