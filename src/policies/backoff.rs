//! Restart backoff policy.
//!
//! [`BackoffPolicy`] controls how the delay before an entity restart grows
//! after repeated failures. It is parameterized by:
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for attempt `n` is `first × factor^n`, clamped to `max`, then
//! jitter is applied. The base is derived purely from the attempt number, so
//! jitter output never feeds back into later calculations.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use devicehub::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(200),
//!     max: Duration::from_secs(5),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(200));
//! assert_eq!(backoff.next(1), Duration::from_millis(400));
//! // 200ms × 2^10 far exceeds the cap
//! assert_eq!(backoff.next(10), Duration::from_secs(5));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Restart backoff policy for supervised entities.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Initial delay before the first restart.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter applied to the clamped base delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns the restart schedule used for device entities:
    /// `first = 200ms`, `factor = 2.0`, `max = 5s`, `jitter = ±10%`.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(200),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::Proportional { factor: 0.1 },
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given restart attempt (0-indexed).
    ///
    /// The base delay is `first × factor^attempt`, clamped to
    /// [`BackoffPolicy::max`]; jitter is applied to the clamped base.
    /// Overflowing or non-finite intermediate values clamp to `max`.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(first_ms: u64, max: Duration, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max,
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn test_attempt_zero_returns_first() {
        let policy = no_jitter(200, Duration::from_secs(5), 2.0);
        assert_eq!(policy.next(0), Duration::from_millis(200));
    }

    #[test]
    fn test_exponential_growth() {
        let policy = no_jitter(200, Duration::from_secs(60), 2.0);
        assert_eq!(policy.next(1), Duration::from_millis(400));
        assert_eq!(policy.next(2), Duration::from_millis(800));
        assert_eq!(policy.next(3), Duration::from_millis(1600));
    }

    #[test]
    fn test_clamped_to_max() {
        let policy = no_jitter(200, Duration::from_secs(5), 2.0);
        assert_eq!(policy.next(30), Duration::from_secs(5));
    }

    #[test]
    fn test_first_exceeds_max() {
        let policy = no_jitter(10_000, Duration::from_secs(5), 2.0);
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn test_huge_attempt_clamps_to_max() {
        let policy = no_jitter(200, Duration::from_secs(5), 2.0);
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_default_schedule_stays_in_jitter_band() {
        let policy = BackoffPolicy::default();
        for attempt in 0..10 {
            let base_ms = (200.0 * 2.0f64.powi(attempt)).min(5_000.0);
            let d = policy.next(attempt as u32);
            assert!(
                d.as_millis() as f64 >= base_ms * 0.9 - 1.0,
                "attempt {attempt}: {d:?} below band"
            );
            assert!(
                d.as_millis() as f64 <= base_ms * 1.1 + 1.0,
                "attempt {attempt}: {d:?} above band"
            );
        }
    }
}
