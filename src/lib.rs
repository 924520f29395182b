//! # flowcast
//!
//! **Flowcast** is a small push-based reactive streams library for Rust.
//!
//! It provides cold flows, hot subjects, and a library of composable
//! stages (map, filter, debounce, zip, retry, ...) with explicit
//! cancellation and typed failures. The crate is designed as a building
//! block for event-driven application state and network plumbing.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   sources                 stages                     subscriber
//!
//! ┌────────────────┐   ┌──────────────────────┐   ┌────────────────────┐
//! │ from_sequence  │   │ map / filter / scan  │   │ on_value(T)        │
//! │ just / empty   │──►│ debounce / throttle  │──►│ on_completion(     │
//! │ timer / fetch  │   │ zip / merge / retry  │   │   Finished|Failed) │
//! │ deferred       │   │ observe_on / ...     │   └─────────┬──────────┘
//! └────────────────┘   └──────────────────────┘             │
//!                                                           ▼
//! ┌────────────────┐                                 ┌──────────────┐
//! │ Passthrough-   │  hot entry points: values       │ Subscription │
//! │ CurrentValue-  │─►pushed by hand multicast       │ cancel() /   │
//! │ Subject, Cell  │  into the same stage chains     │ guard()      │
//! └────────────────┘                                 └──────────────┘
//! ```
//!
//! ### Delivery contract
//! ```text
//! subscribe() ──► producer attaches bottom-up, values flow top-down
//!
//! per subscription:
//!   ├─► zero or more on_value(T), in order
//!   ├─► at most one terminal: Finished | Failed(E)
//!   ├─► nothing after the terminal
//!   └─► nothing after Subscription::cancel(), including the terminal
//! ```
//!
//! ## Quick start
//! ```rust
//! use flowcast::Flow;
//!
//! let doubled = Flow::from_sequence([1, 2, 3])
//!     .map(|n| n * 2)
//!     .filter(|n| *n > 2);
//!
//! let sub = doubled.subscribe_values(|n| println!("{n}"));
//! sub.cancel();
//! ```
//!
//! Time-aware stages take a [`Scheduler`]:
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use flowcast::{Flow, SchedulerRef, TokioScheduler};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let scheduler: SchedulerRef = Arc::new(TokioScheduler::current());
//! let ticks = Flow::<u64>::timer(Duration::from_secs(1), &scheduler)
//!     .debounce(Duration::from_millis(300), &scheduler);
//! # }
//! ```
//!
//! ## Modules
//! | Module | Purpose |
//! |--------|---------|
//! | core | [`Flow`], [`Completion`], [`Subscription`] |
//! | sources | `from_sequence`, `just`, `empty`, `never`, `fail`, `deferred`, `timer` |
//! | ops | the stage library, plus the [`FlowStream`] async bridge |
//! | subjects | [`PassthroughSubject`], [`CurrentValueSubject`], [`ValueCell`] |
//! | scheduler | [`Scheduler`] trait, [`TokioScheduler`], [`EventLoopScheduler`] |
//! | policies | [`BackoffPolicy`], [`JitterPolicy`] for `retry_backoff` |
//! | net | the [`Fetch`] seam and JSON decoding (feature `json`) |

mod core;
mod error;
mod net;
mod ops;
mod policies;
mod scheduler;
mod sources;
mod subjects;

pub use crate::core::{Completion, Flow, Subscription, SubscriptionGuard};
pub use crate::error::FlowError;
pub use crate::net::Fetch;
pub use crate::ops::FlowStream;
pub use crate::policies::{BackoffPolicy, JitterPolicy};
pub use crate::scheduler::{
    EventLoopScheduler, Job, Scheduler, SchedulerRef, TickJob, TokioScheduler,
};
pub use crate::subjects::{CurrentValueSubject, PassthroughSubject, ValueCell};
