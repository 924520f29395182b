//! Pipeline core: delivery, attachment and cancellation.
//!
//! This module contains the machinery every stage is built on. The public
//! API from this module is [`Flow`], [`Subscription`] (plus its drop guard)
//! and the [`Completion`] terminal signal.
//!
//! Internal modules:
//! - [`sink`]: the gated push handle enforcing the delivery invariants;
//! - [`flow`]: the cold `Flow` handle and the subscribe entry points;
//! - [`subscription`]: cancellation handle and scoped auto-cancel guard.

mod flow;
mod sink;
mod subscription;

pub use flow::Flow;
pub use sink::Completion;
pub use subscription::{Subscription, SubscriptionGuard};

pub(crate) use sink::Sink;
