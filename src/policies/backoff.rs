//! # Backoff policy for retried flows.
//!
//! [`BackoffPolicy`] controls how the pause between retry attempts grows.
//! It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for attempt `n` is `first × factor^n`, clamped to `max`, then
//! jitter is applied. The base derives purely from the attempt number, so
//! jitter output never feeds back into later attempts and delays cannot
//! drift downward over a long retry run.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use flowcast::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//! // 100ms × 2^10 overflows the cap, clamped to max=10s
//! assert_eq!(backoff.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Pacing for [`Flow::retry_backoff`](crate::Flow::retry_backoff).
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Initial delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap for retries.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy to prevent thundering herd.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 100ms pauses, capped at 30s, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            jitter: JitterPolicy::None,
            factor: 1.0,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// The base delay is `first × factor^attempt`, clamped to
    /// [`BackoffPolicy::max`]. Jitter applies to the clamped base; each
    /// attempt derives its base independently of the jittered outcome of
    /// the previous one.
    ///
    /// A `factor` below 1.0 shrinks delays with higher attempts, 1.0 keeps
    /// them constant at `first`, above 1.0 grows them up to `max`.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(first: Duration, max: Duration, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first,
            max,
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn test_attempt_zero_returns_first() {
        let policy = plain(Duration::from_millis(100), Duration::from_secs(30), 2.0);
        assert_eq!(policy.next(0), Duration::from_millis(100));
    }

    #[test]
    fn test_delays_grow_by_factor() {
        let policy = plain(Duration::from_millis(100), Duration::from_secs(30), 2.0);
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_clamps_to_max() {
        let policy = plain(Duration::from_millis(100), Duration::from_secs(1), 2.0);
        assert_eq!(policy.next(20), Duration::from_secs(1));
    }

    #[test]
    fn test_constant_factor_keeps_first() {
        let policy = plain(Duration::from_millis(250), Duration::from_secs(30), 1.0);
        assert_eq!(policy.next(0), Duration::from_millis(250));
        assert_eq!(policy.next(7), Duration::from_millis(250));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = plain(Duration::from_millis(100), Duration::from_secs(30), 10.0);
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_full_jitter_stays_within_base() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::Full,
        };
        for _ in 0..100 {
            assert!(policy.next(3) <= Duration::from_millis(800));
        }
    }
}
