//! # Current-value subject.
//!
//! Like [`PassthroughSubject`](crate::PassthroughSubject) but it retains
//! the most recent value and replays it to each new subscriber before any
//! further sends.
//!
//! Replay happens right after the subscriber registers. Under concurrent
//! sends from another thread a fresher value may land before the replay
//! does; single-threaded use always sees retained-value-first.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use crate::core::{Completion, Flow, Sink};
use crate::subjects::registry::Registry;

pub struct CurrentValueSubject<T, E = Infallible> {
    registry: Arc<Registry<T, E>>,
    retained: Arc<Mutex<T>>,
}

impl<T, E> CurrentValueSubject<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new(initial: T) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            retained: Arc::new(Mutex::new(initial)),
        }
    }

    /// The most recently sent value (or the initial one).
    pub fn value(&self) -> T {
        self.retained.lock().expect("retained value").clone()
    }

    /// Retains `value` and multicasts it to every live subscriber.
    pub fn send(&self, value: T) {
        *self.retained.lock().expect("retained value") = value.clone();
        self.registry.broadcast(value);
    }

    /// Mutates the retained value in place, then multicasts the result.
    pub(crate) fn update_with<F>(&self, apply: F)
    where
        F: FnOnce(&mut T),
    {
        let fresh = {
            let mut retained = self.retained.lock().expect("retained value");
            apply(&mut retained);
            retained.clone()
        };
        self.registry.broadcast(fresh);
    }

    pub fn finish(&self) {
        self.registry.terminate(Completion::Finished);
    }

    pub fn fail(&self, error: E) {
        self.registry.terminate(Completion::Failed(error));
    }

    /// A cold handle onto this subject. Each new subscriber first receives
    /// the retained value; after termination only the terminal replays.
    pub fn flow(&self) -> Flow<T, E> {
        let registry = Arc::clone(&self.registry);
        let retained = Arc::clone(&self.retained);
        Flow::from_attach(move |sink: Sink<T, E>| {
            match registry.register(sink.clone()) {
                Some(terminal) => sink.terminate(terminal),
                None => {
                    let current = retained.lock().expect("retained value").clone();
                    sink.value(current);
                }
            }
        })
    }
}

impl<T, E> Clone for CurrentValueSubject<T, E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            retained: Arc::clone(&self.retained),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static) {
        let out = Arc::new(Mutex::new(Vec::new()));
        let tap = Arc::clone(&out);
        (out, move |v| tap.lock().unwrap().push(v))
    }

    #[test]
    fn test_replays_retained_value_to_new_subscriber() {
        let subject: CurrentValueSubject<u32, ()> = CurrentValueSubject::new(7);
        let (got, on_value) = recorder();
        let _sub = subject.flow().subscribe(on_value, |_| {});
        assert_eq!(*got.lock().unwrap(), vec![7]);
        subject.send(8);
        assert_eq!(*got.lock().unwrap(), vec![7, 8]);
        assert_eq!(subject.value(), 8);
    }

    #[test]
    fn test_late_subscriber_sees_latest_not_history() {
        let subject: CurrentValueSubject<u32, ()> = CurrentValueSubject::new(1);
        subject.send(2);
        subject.send(3);
        let (got, on_value) = recorder();
        let _sub = subject.flow().subscribe(on_value, |_| {});
        assert_eq!(*got.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_subscribe_after_finish_replays_no_value() {
        let subject: CurrentValueSubject<u32, ()> = CurrentValueSubject::new(1);
        subject.finish();
        let end = Arc::new(Mutex::new(None));
        let tap = Arc::clone(&end);
        let _sub = subject.flow().subscribe(
            |_| panic!("no replay after termination"),
            move |c| *tap.lock().unwrap() = Some(c),
        );
        assert_eq!(*end.lock().unwrap(), Some(Completion::Finished));
    }
}
