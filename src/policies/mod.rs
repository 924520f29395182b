//! Retry pacing policies.
//!
//! The knobs behind [`Flow::retry_backoff`](crate::Flow::retry_backoff):
//! how long to wait between re-subscriptions of a failed flow.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid thundering herd
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=100ms, factor=1.0 (constant), max=30s, jitter=None.
//! - `JitterPolicy::None` by default; consider `Equal` when many flows retry
//!   against the same backend.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
