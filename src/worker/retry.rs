//! Exponential backoff for failed passes.
//!
//! A failed pass is not retried in place. The worker schedules another pass
//! after a delay that doubles with each consecutive failure, and resets once
//! a pass succeeds. There is no retry limit: the loop is level-triggered and
//! a store that comes back should be picked up without operator action.

use std::time::Duration;

/// Configuration for exponential backoff between failed passes.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Delay after the first failure.
    pub initial_delay: Duration,

    /// Maximum delay between retries (cap for exponential growth).
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (typically 2.0).
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// 1s, 2s, 4s, ... capped at 5 minutes.
    pub const DEFAULT: Self = Self {
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(300),
        backoff_multiplier: 2.0,
    };

    pub fn new(initial_delay: Duration, max_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            initial_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Computes the delay for the given retry attempt (0-indexed).
    ///
    /// The delay grows exponentially: `initial_delay * backoff_multiplier^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let multiplier = self.backoff_multiplier.powi(exponent);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
