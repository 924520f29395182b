//! # The `Flow` handle: a cold, composable stream of values.
//!
//! A [`Flow<T, E>`] produces an ordered sequence of `T` values terminated by
//! exactly one [`Completion<E>`] signal. Flows are **values**: cheap to
//! clone, immutable once built, with no identity of their own.
//!
//! ## Cold by construction
//! A flow is a recipe. Every [`subscribe`](Flow::subscribe) re-runs its
//! producer from scratch, so two subscribers to the same `Flow` each get the
//! full sequence. Hot sharing is provided by the subject types
//! ([`PassthroughSubject`](crate::PassthroughSubject),
//! [`CurrentValueSubject`](crate::CurrentValueSubject)), whose flows fan out
//! one shared upstream.
//!
//! ## Delivery context
//! Synchronous sources deliver on the caller's context, inline with
//! `subscribe`. Time-based stages deliver from their scheduler's context.
//! [`observe_on`](Flow::observe_on) and
//! [`subscribe_on_scheduler`](Flow::subscribe_on_scheduler) move stage work
//! and final delivery respectively; see `ops/context.rs`.
//!
//! ## Example
//! ```
//! use flowcast::Flow;
//!
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
//! let sink = std::sync::Arc::clone(&seen);
//!
//! Flow::from_sequence(1..=4)
//!     .map(|n| n * 10)
//!     .filter(|n| *n > 10)
//!     .subscribe_values(move |n| sink.lock().unwrap().push(n));
//!
//! assert_eq!(*seen.lock().unwrap(), vec![20, 30, 40]);
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::sink::{Completion, Sink};
use crate::core::subscription::Subscription;

/// Attachment behavior of a flow: runs the producer for one subscriber.
pub(crate) trait Producer<T, E>: Send + Sync + 'static {
    fn attach(&self, sink: Sink<T, E>);
}

struct FnProducer<F>(F);

impl<T, E, F> Producer<T, E> for FnProducer<F>
where
    T: Send + 'static,
    E: Send + 'static,
    F: Fn(Sink<T, E>) + Send + Sync + 'static,
{
    fn attach(&self, sink: Sink<T, E>) {
        (self.0)(sink);
    }
}

/// A cold stream of `T` values ending in one [`Completion<E>`].
///
/// See the [module docs](self) for semantics. Stage methods live in the
/// `ops` modules; sources in [`sources`](crate::Flow#sources).
pub struct Flow<T, E = Infallible> {
    producer: Arc<dyn Producer<T, E>>,
}

impl<T, E> Clone for Flow<T, E> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<T, E> Flow<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Builds a flow from an attach closure; the closure runs once per
    /// subscriber and must eventually deliver exactly one terminal signal
    /// (unless the flow is intentionally endless).
    pub(crate) fn from_attach<F>(attach: F) -> Self
    where
        F: Fn(Sink<T, E>) + Send + Sync + 'static,
    {
        Self {
            producer: Arc::new(FnProducer(attach)),
        }
    }

    /// Runs the producer for the given sink.
    pub(crate) fn attach(&self, sink: Sink<T, E>) {
        self.producer.attach(sink);
    }

    /// Attaches a consumer callback pair and returns the cancellation handle.
    ///
    /// `on_value` fires once per value; `on_completion` fires exactly once,
    /// with [`Completion::Finished`] or [`Completion::Failed`], after which
    /// no value callbacks fire. Cancelling the returned [`Subscription`]
    /// (even from inside `on_value`) suppresses every later callback.
    pub fn subscribe<V, C>(&self, on_value: V, on_completion: C) -> Subscription
    where
        V: Fn(T) + Send + Sync + 'static,
        C: FnOnce(Completion<E>) + Send + 'static,
    {
        let token = CancellationToken::new();
        let sink = Sink::new(token.clone(), on_value, on_completion);
        tracing::trace!("subscriber attached");
        self.attach(sink);
        Subscription::new(token)
    }
}

impl<T> Flow<T, Infallible>
where
    T: Send + 'static,
{
    /// Convenience attach for flows whose error type is uninhabited.
    ///
    /// Only a value callback is needed: the terminal signal can only be
    /// `Finished`, which carries no information worth handling.
    pub fn subscribe_values<V>(&self, on_value: V) -> Subscription
    where
        V: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe(on_value, |_| {})
    }
}
