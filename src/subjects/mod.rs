//! # Hot subjects.
//!
//! Subjects are the imperative entry points into a chain: code pushes
//! values in by hand and every current subscriber receives them.
//!
//! | Type | Retention | Use for |
//! |------|-----------|---------|
//! | [`PassthroughSubject`] | none | events |
//! | [`CurrentValueSubject`] | latest value | state with replay |
//! | [`ValueCell`] | latest value, never fails | observable app state |

mod cell;
mod current_value;
mod passthrough;
mod registry;

pub use cell::ValueCell;
pub use current_value::CurrentValueSubject;
pub use passthrough::PassthroughSubject;
