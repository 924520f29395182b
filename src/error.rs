//! Error types used by flowcast pipelines.
//!
//! Flows are generic over their error type, so most stages never touch this
//! module: a pipeline may carry any `E: Send + 'static`, including
//! [`std::convert::Infallible`] for chains that provably cannot fail.
//!
//! [`FlowError`] is the concrete error the crate's own fallible collaborators
//! produce:
//!
//! - [`FlowError::Timeout`] — no signal arrived within a timeout window.
//! - [`FlowError::Fetch`] — a [`Fetch`](crate::Fetch) collaborator failed.
//! - [`FlowError::Decode`] — a decode stage rejected its input bytes.
//! - [`FlowError::Stage`] — a transformation closure signalled failure.
//!
//! Helper methods (`as_label`, `as_message`) produce stable strings for
//! logs/metrics. [`FlowError::is_retryable`] classifies a failure as
//! transient or deterministic; the retry stages themselves re-attach on any
//! error, so callers consult it when deciding whether to wrap a chain in
//! [`retry`](crate::Flow::retry) at all, or to give up inside a
//! [`catch`](crate::Flow::catch) handler.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by flowcast's own fallible stages and collaborators.
///
/// User pipelines are free to flow any error type; this enum covers the
/// failure cases the crate itself can originate.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// No value or terminal signal arrived within the timeout window.
    #[error("no signal within {elapsed:?}")]
    Timeout {
        /// The configured quiet-window duration that elapsed.
        elapsed: Duration,
    },

    /// A fetch collaborator failed to produce bytes for a URL.
    #[error("fetch of {url} failed: {reason}")]
    Fetch {
        /// The URL that was requested.
        url: String,
        /// The underlying failure message.
        reason: String,
    },

    /// Raw bytes could not be decoded into the requested shape.
    #[error("decode failed: {reason}")]
    Decode {
        /// The underlying decoder message.
        reason: String,
    },

    /// A transformation closure explicitly signalled failure.
    #[error("stage failed: {reason}")]
    Stage {
        /// The failure message supplied by the stage.
        reason: String,
    },
}

impl FlowError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use flowcast::FlowError;
    ///
    /// let err = FlowError::Timeout { elapsed: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "flow_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FlowError::Timeout { .. } => "flow_timeout",
            FlowError::Fetch { .. } => "flow_fetch",
            FlowError::Decode { .. } => "flow_decode",
            FlowError::Stage { .. } => "flow_stage",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            FlowError::Timeout { elapsed } => format!("timeout: {elapsed:?}"),
            FlowError::Fetch { url, reason } => format!("fetch {url}: {reason}"),
            FlowError::Decode { reason } => format!("decode: {reason}"),
            FlowError::Stage { reason } => format!("stage: {reason}"),
        }
    }

    /// Indicates whether another attempt can plausibly succeed.
    ///
    /// Returns `true` for [`FlowError::Timeout`] and [`FlowError::Fetch`]
    /// (transient conditions), `false` for decode and stage failures, which
    /// are deterministic for the same input.
    ///
    /// # Example
    /// ```
    /// use flowcast::FlowError;
    ///
    /// let transient = FlowError::Fetch { url: "x".into(), reason: "reset".into() };
    /// assert!(transient.is_retryable());
    ///
    /// let deterministic = FlowError::Decode { reason: "bad json".into() };
    /// assert!(!deterministic.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::Timeout { .. } | FlowError::Fetch { .. })
    }
}
