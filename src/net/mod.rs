//! # Network collaborators.
//!
//! The seam between flow chains and the outside world: [`Fetch`] produces
//! bytes for a URL, and the `json` feature adds
//! [`Flow::decode_json`](crate::Flow::decode_json) to parse them into
//! typed values. A typical chain:
//!
//! ```text
//! Flow::fetch(client, url) ─▶ decode_json::<Post>() ─▶ replace_error(vec![]) ─▶ subscribe
//! ```

#[cfg(feature = "json")]
mod decode;
mod fetch;

pub use fetch::Fetch;
