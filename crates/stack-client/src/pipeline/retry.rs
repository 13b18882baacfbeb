//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// How often and how patiently a request is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt, before jitter.
    pub base_delay: Duration,
    /// Multiply each delay by a random factor in `[0.5, 1.5)`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first attempt.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// The delay after failed attempt number `attempt` (zero-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay.saturating_mul(2u32.saturating_pow(attempt.min(16)));
        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.5..1.5);
            exponential.mul_f64(factor)
        } else {
            exponential
        }
    }
}
