//! Jitter policies for restart delays.
//!
//! [`JitterPolicy`] adds randomness to backoff delays so that many entities
//! failing together (a shared-storage outage takes all of them down at once)
//! do not retry in lockstep.
//!
//! - [`JitterPolicy::None`] — no randomization, predictable delays
//! - [`JitterPolicy::Full`] — random delay in [0, base]
//! - [`JitterPolicy::Equal`] — base/2 + random[0, base/2]
//! - [`JitterPolicy::Proportional`] — base ± `factor` fraction of base

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of restart delays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JitterPolicy {
    /// No jitter: use the exact backoff delay.
    ///
    /// Predictable timing; fine for a single entity or for tests.
    None,

    /// Full jitter: random delay in [0, base].
    ///
    /// Maximum spread, can shrink the delay to near zero.
    Full,

    /// Equal jitter: base/2 + random[0, base/2].
    ///
    /// Preserves at least half of the computed delay.
    Equal,

    /// Proportional jitter: base ± `factor` fraction of base.
    ///
    /// `factor = 0.1` yields a delay in [0.9 × base, 1.1 × base], the shape
    /// expected when a restart schedule must stay close to its nominal curve
    /// while still decorrelating a herd.
    Proportional {
        /// Fraction of the base delay used as the random band (0.0..=1.0).
        factor: f64,
    },
}

impl Default for JitterPolicy {
    /// Returns [`JitterPolicy::None`].
    fn default() -> Self {
        JitterPolicy::None
    }
}

impl JitterPolicy {
    /// Applies jitter to the given base delay.
    pub fn apply(&self, base: Duration) -> Duration {
        match self {
            JitterPolicy::None => base,
            JitterPolicy::Full => Self::full_jitter(base),
            JitterPolicy::Equal => Self::equal_jitter(base),
            JitterPolicy::Proportional { factor } => Self::proportional_jitter(base, *factor),
        }
    }

    /// Full jitter: random[0, base]
    fn full_jitter(base: Duration) -> Duration {
        let ms = base.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=ms))
    }

    /// Equal jitter: base/2 + random[0, base/2]
    fn equal_jitter(base: Duration) -> Duration {
        let ms = base.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        let half = ms / 2;
        let jitter = if half == 0 {
            0
        } else {
            rand::rng().random_range(0..=half)
        };
        Duration::from_millis(half + jitter)
    }

    /// Proportional jitter: base ± factor × base
    fn proportional_jitter(base: Duration, factor: f64) -> Duration {
        let factor = factor.clamp(0.0, 1.0);
        let ms = base.as_millis() as u64;
        let band = (ms as f64 * factor) as u64;
        if band == 0 {
            return base;
        }
        let lower = ms.saturating_sub(band);
        Duration::from_millis(rand::rng().random_range(lower..=ms + band))
    }
}
