//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] adds randomness to backoff delays so that many flows
//! retrying against the same backend do not line up their attempts.
//!
//! - [`JitterPolicy::None`] — no randomization, predictable delays
//! - [`JitterPolicy::Full`] — random delay in [0, backoff_delay]
//! - [`JitterPolicy::Equal`] — delay/2 + random[0, delay/2] (balanced)
//! - [`JitterPolicy::Decorrelated`] — grows from the previous delay

use rand::Rng;
use std::time::Duration;

/// Randomization applied on top of a computed backoff delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use the exact backoff delay. The right choice for a
    /// single retrying flow, and for tests that assert on timing.
    None,

    /// Full jitter: random delay in [0, backoff_delay]. Maximum load
    /// spreading, can shorten the pause to near zero.
    Full,

    /// Equal jitter: delay/2 + random[0, delay/2]. Keeps at least half of
    /// the computed pause while still spreading retries.
    Equal,

    /// Decorrelated jitter: random[base, prev_delay × 3], capped at max.
    /// Needs context and goes through
    /// [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl Default for JitterPolicy {
    fn default() -> Self {
        JitterPolicy::None
    }
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    ///
    /// `Decorrelated` returns the input unchanged here; it needs the
    /// previous delay and cap, via
    /// [`apply_decorrelated`](Self::apply_decorrelated).
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => self.full_jitter(delay),
            JitterPolicy::Equal => self.equal_jitter(delay),
            JitterPolicy::Decorrelated => delay,
        }
    }

    /// Applies decorrelated jitter with full context. On any other
    /// variant, falls back to `apply(prev)`.
    pub fn apply_decorrelated(&self, base: Duration, prev: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(prev);
        }

        let mut rng = rand::rng();
        let base_ms = base.as_millis() as u64;
        let prev_ms = prev.as_millis() as u64;
        let max_ms = max.as_millis() as u64;

        let upper_bound = (prev_ms.saturating_mul(3)).min(max_ms);
        let clamped_upper = upper_bound.max(base_ms);

        if base_ms >= clamped_upper {
            return base;
        }

        let jittered_ms = rng.random_range(base_ms..=clamped_upper);
        Duration::from_millis(jittered_ms)
    }

    /// Full jitter: random[0, delay]
    fn full_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::rng();
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.random_range(0..=ms))
    }

    /// Equal jitter: delay/2 + random[0, delay/2]
    fn equal_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::rng();
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        let half = ms / 2;
        let jitter = if half == 0 {
            0
        } else {
            rng.random_range(0..=half)
        };
        Duration::from_millis(half + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_identity() {
        let delay = Duration::from_millis(350);
        assert_eq!(JitterPolicy::None.apply(delay), delay);
    }

    #[test]
    fn test_equal_jitter_keeps_at_least_half() {
        let delay = Duration::from_millis(400);
        for _ in 0..100 {
            let jittered = JitterPolicy::Equal.apply(delay);
            assert!(jittered >= Duration::from_millis(200));
            assert!(jittered <= delay);
        }
    }

    #[test]
    fn test_full_jitter_never_exceeds_delay() {
        let delay = Duration::from_millis(400);
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(delay) <= delay);
        }
    }

    #[test]
    fn test_decorrelated_respects_bounds() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(1);
        for _ in 0..100 {
            let jittered = JitterPolicy::Decorrelated.apply_decorrelated(
                base,
                Duration::from_millis(500),
                max,
            );
            assert!(jittered >= base);
            assert!(jittered <= max);
        }
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
