//! Capped exponential backoff.

use std::time::Duration;

use crate::constants::MAX_BACKOFF_EXPONENT;

/// Exponential backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay after the first failed attempt.
    pub initial: Duration,
    /// Upper bound of any delay.
    pub max: Duration,
}

impl BackoffConfig {
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Computes the delay after the zero-based `attempt` failed:
    /// `min(initial * 2^attempt, max)`.
    ///
    /// The exponent is clamped and the multiplication saturates, so large
    /// attempt numbers settle at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.min(MAX_BACKOFF_EXPONENT));
        self.initial.saturating_mul(factor).min(self.max)
    }
}
