//! # Push target for one live subscription.
//!
//! A [`Sink`] is the internal delivery handle every stage pushes into. It
//! carries the subscription's [`CancellationToken`], the consumer-side
//! callbacks, and a once-only terminal latch.
//!
//! ## Delivery rules
//! - A value is delivered only while the sink is **live**: not cancelled and
//!   not yet terminated.
//! - Exactly **one** terminal signal ([`Completion::Finished`] or
//!   [`Completion::Failed`]) is ever delivered; later ones are ignored.
//! - Cancelling the token from **inside** a value callback suppresses every
//!   later callback for this sink, including the terminal one.
//!
//! ## Chain wiring
//! Stages derive an upstream sink from their downstream sink. Most stages
//! share the downstream token, so one `cancel()` at the subscription root
//! releases the whole chain. Stages that terminate their upstream early
//! (`first`, `prefix`, `switch_to_latest`, `timeout`, ...) attach upstream
//! with a [`child_token`](CancellationToken::child_token) instead: cancelling
//! the child stops the upstream without touching the downstream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// Terminal signal of a flow: completed normally or failed with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion<E> {
    /// The flow delivered every value it will ever deliver.
    Finished,
    /// The flow terminated early with an error.
    Failed(E),
}

impl<E> Completion<E> {
    /// Returns `true` for [`Completion::Failed`].
    pub fn is_failure(&self) -> bool {
        matches!(self, Completion::Failed(_))
    }

    /// Maps the error type, leaving `Finished` untouched.
    pub fn map_err<E2>(self, f: impl FnOnce(E) -> E2) -> Completion<E2> {
        match self {
            Completion::Finished => Completion::Finished,
            Completion::Failed(e) => Completion::Failed(f(e)),
        }
    }
}

struct SinkInner<T, E> {
    token: CancellationToken,
    terminated: AtomicBool,
    on_value: Box<dyn Fn(T) + Send + Sync>,
    // FnOnce behind a lock so the terminal callback can own its captures.
    on_terminal: Mutex<Option<Box<dyn FnOnce(Completion<E>) + Send>>>,
}

/// Cheap-clone push handle for one attachment of a consumer chain.
pub(crate) struct Sink<T, E> {
    inner: Arc<SinkInner<T, E>>,
}

impl<T, E> Clone for Sink<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Sink<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Builds a sink bound to `token` with the given callbacks.
    pub(crate) fn new<V, C>(token: CancellationToken, on_value: V, on_terminal: C) -> Self
    where
        V: Fn(T) + Send + Sync + 'static,
        C: FnOnce(Completion<E>) + Send + 'static,
    {
        Self {
            inner: Arc::new(SinkInner {
                token,
                terminated: AtomicBool::new(false),
                on_value: Box::new(on_value),
                on_terminal: Mutex::new(Some(Box::new(on_terminal))),
            }),
        }
    }

    /// The cancellation token gating every delivery through this sink.
    pub(crate) fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    /// `true` while deliveries are still possible.
    pub(crate) fn is_live(&self) -> bool {
        !self.inner.terminated.load(Ordering::Acquire) && !self.inner.token.is_cancelled()
    }

    /// Delivers one value, unless the sink is cancelled or terminated.
    pub(crate) fn value(&self, v: T) {
        if self.is_live() {
            (self.inner.on_value)(v);
        }
    }

    /// Delivers the terminal signal at most once.
    ///
    /// A cancelled sink latches terminated without invoking the callback:
    /// cancellation already ended the subscription from the consumer's side.
    pub(crate) fn terminate(&self, completion: Completion<E>) {
        if self.inner.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.inner.token.is_cancelled() {
            tracing::trace!("terminal signal dropped: subscription cancelled");
            return;
        }
        let cb = self.inner.on_terminal.lock().expect("sink lock").take();
        if let Some(cb) = cb {
            cb(completion);
        }
    }

    /// Shorthand for `terminate(Completion::Finished)`.
    pub(crate) fn finish(&self) {
        self.terminate(Completion::Finished);
    }

    /// Shorthand for `terminate(Completion::Failed(err))`.
    pub(crate) fn fail(&self, err: E) {
        self.terminate(Completion::Failed(err));
    }
}
