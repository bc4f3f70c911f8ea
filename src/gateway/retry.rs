//! Exponential backoff for gateway retries

use std::time::Duration;

use crate::config::RetryConfig;

/// Bounds of the multiplicative jitter applied to each delay
pub const JITTER_RANGE: (f64, f64) = (0.8, 1.2);

/// Retry budget and delay schedule for one gateway
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: f64,
    max_delay: f64,
    multiplier: f64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_retries.max(1),
            base_delay: config.base_delay_seconds.max(0.0),
            max_delay: config.max_delay_seconds.max(0.0),
            multiplier: config.backoff_multiplier,
        }
    }

    /// Total attempts a call may make, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `attempt` (0-based) with an explicit jitter factor.
    ///
    /// `min(max_delay, base * multiplier^attempt * jitter)`
    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.base_delay * self.multiplier.powi(exponent) * jitter;
        let capped = if raw.is_finite() { raw.min(self.max_delay) } else { self.max_delay };
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Delay before retry number `attempt` with random jitter in [0.8, 1.2]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter = rand::random_range(JITTER_RANGE.0..=JITTER_RANGE.1);
        self.delay_with_jitter(attempt, jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
