//! Stage combinators: everything between a source and a subscriber.
//!
//! Each file groups one family of stages, all implemented as inherent
//! methods on [`Flow`](crate::Flow) that wrap the upstream flow in a new
//! producer:
//!
//! - [`transform`]: `map`, `try_map`, `filter`, `compact_map`, `scan`,
//!   `map_error`, `set_failure_type`, `ignore_output`
//! - [`reduce`]: `reduce`, `count`, `contains`, `all_satisfy`, `min`, `max`
//! - [`slice`]: `first`/`last` (+ `_where`), `prefix`, `skip`,
//!   `prefix_until`, `skip_until`, `remove_duplicates`
//! - [`seq`]: `append`, `prepend`, `prepend_items`, `replace_empty`
//! - [`buffer`]: `collect`, `collect_count`, `collect_by_time_or_count`
//! - [`time`]: `debounce`, `throttle`, `delay`, `timeout`,
//!   `measure_interval`
//! - [`combine`]: `merge`, `zip`, `combine_latest` (+ 3-ary forms)
//! - [`flatten`]: `flat_map`, `flat_map_bounded`, `switch_to_latest`
//! - [`recover`]: `catch`, `replace_error`, `retry`, `retry_backoff`,
//!   `assert_no_failure`
//! - [`context`]: `observe_on` and scheduler-side final delivery
//! - [`bridge`]: `into_stream` interop with `futures::Stream`
//!
//! ## Wiring convention
//! A stage's attach builds an upstream [`Sink`](crate::core::Sink) around
//! the downstream one. Stages that can terminate the downstream while the
//! upstream is still producing (`first`, `prefix`, `timeout`, error paths in
//! `try_map`, ...) attach upstream with a **child token** and cancel it at
//! that moment, so a terminated chain stops doing upstream work without
//! affecting the subscriber's root token.

mod bridge;
mod buffer;
mod combine;
mod context;
mod flatten;
mod recover;
mod reduce;
mod seq;
mod slice;
mod time;
mod transform;

pub use bridge::FlowStream;

use crate::core::Completion;

/// One delivery moving through a context hop or bridge channel.
pub(crate) enum Signal<T, E> {
    Value(T),
    Terminal(Completion<E>),
}
