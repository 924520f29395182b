//! # Subscription handle and scoped auto-cancel guard.
//!
//! Attaching a consumer to a [`Flow`](crate::Flow) returns a
//! [`Subscription`]. It owns nothing but the subscription's root
//! [`CancellationToken`]; cancelling it synchronously stops every delivery
//! and releases upstream attachments and pending timers held transitively by
//! the chain (timer tasks park on child tokens of the same root).
//!
//! ## Rules
//! - `cancel()` is idempotent.
//! - `cancel()` is safe to call from inside the consumer's own value or
//!   completion callback.
//! - Dropping a `Subscription` does **not** cancel it; call
//!   [`Subscription::guard`] for deterministic cancel-on-scope-exit.

use tokio_util::sync::{CancellationToken, DropGuard};

/// Live attachment between a flow and a consumer.
#[derive(Debug, Clone)]
pub struct Subscription {
    token: CancellationToken,
}

impl Subscription {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Stops all future deliveries for this attachment.
    ///
    /// Synchronous and idempotent. Values already being delivered on another
    /// context race cooperatively: each delivery re-checks the token first.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::trace!("subscription cancelled");
            self.token.cancel();
        }
    }

    /// `true` once [`cancel`](Subscription::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Converts the handle into a guard that cancels when dropped.
    ///
    /// This is the scoped-acquisition form: the subscription is released
    /// deterministically when the guard's owning scope exits.
    ///
    /// # Example
    /// ```
    /// use flowcast::Flow;
    ///
    /// let flow = Flow::from_sequence(1..=3);
    /// {
    ///     let _guard = flow.subscribe_values(|_v| {}).guard();
    ///     // consumer stays attached for the rest of this scope
    /// } // cancelled here
    /// ```
    pub fn guard(self) -> SubscriptionGuard {
        SubscriptionGuard {
            _inner: self.token.drop_guard(),
        }
    }
}

/// Scope guard returned by [`Subscription::guard`]; cancels on drop.
#[derive(Debug)]
pub struct SubscriptionGuard {
    _inner: DropGuard,
}
