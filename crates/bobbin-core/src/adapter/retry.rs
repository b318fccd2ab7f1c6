//! Retry policy for optimistic writes that lost a race.

use std::time::Duration;

/// Backoff between read-modify-write attempts after a version conflict.
///
/// Delay grows as `base_delay * multiplier^(attempt - 1)`, capped at
/// `max_delay`, with jitter so that racing writers spread out.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn conflicts() -> Self {
        Self {
            base_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_delay: Duration::from_millis(250),
            max_attempts: 50,
        }
    }

    /// Deterministic delay after `attempts` failed attempts (1-indexed).
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = base_secs * self.multiplier.powi(exponent);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }

    /// `next_delay` scaled by a random factor in `[0.5, 1.0]`.
    pub fn jittered_delay(&self, attempts: u32) -> Duration {
        let factor: f64 = rand::random::<f64>() * 0.5 + 0.5;
        self.next_delay(attempts).mul_f64(factor)
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::conflicts()
    }
}
