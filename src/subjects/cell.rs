//! # Observable value cell.
//!
//! [`ValueCell`] is the state-holder pattern: a piece of mutable state
//! whose every change is observable as a flow. Views of the state
//! subscribe to [`ValueCell::changes`] while logic mutates it with
//! [`ValueCell::set`] or [`ValueCell::update`].
//!
//! The change flow never fails and never finishes while the cell is
//! alive, so subscribers only deal with values.

use std::convert::Infallible;

use crate::core::Flow;
use crate::subjects::current_value::CurrentValueSubject;

pub struct ValueCell<T> {
    subject: CurrentValueSubject<T, Infallible>,
}

impl<T> ValueCell<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(initial: T) -> Self {
        Self {
            subject: CurrentValueSubject::new(initial),
        }
    }

    /// A snapshot of the current state.
    pub fn get(&self) -> T {
        self.subject.value()
    }

    /// Replaces the state, notifying every observer.
    pub fn set(&self, value: T) {
        self.subject.send(value);
    }

    /// Mutates the state in place, notifying every observer with the
    /// result. Handy when replacing wholesale would clone needlessly.
    pub fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut T),
    {
        self.subject.update_with(apply);
    }

    /// The state as a flow: the current value immediately, then every
    /// change.
    pub fn changes(&self) -> Flow<T, Infallible> {
        self.subject.flow()
    }
}

impl<T> Clone for ValueCell<T> {
    fn clone(&self) -> Self {
        Self {
            subject: self.subject.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_observer_sees_current_then_changes() {
        let cell = ValueCell::new(0u32);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tap = Arc::clone(&seen);
        let _sub = cell
            .changes()
            .subscribe_values(move |v| tap.lock().unwrap().push(v));

        cell.set(1);
        cell.update(|n| *n += 10);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 11]);
        assert_eq!(cell.get(), 11);
    }

    #[test]
    fn test_derived_view_through_stages() {
        let cell = ValueCell::new(2u32);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tap = Arc::clone(&seen);
        let _sub = cell
            .changes()
            .map(|n| n * n)
            .remove_duplicates()
            .subscribe_values(move |v| tap.lock().unwrap().push(v));

        cell.set(2); // same square, deduplicated
        cell.set(3);
        assert_eq!(*seen.lock().unwrap(), vec![4, 9]);
    }
}
