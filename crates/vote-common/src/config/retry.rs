//! Retry policy for the reaction coordinator's conflict loop

use rand::Rng;
use std::time::Duration;

/// Bounded exponential backoff with jitter
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 10, 500, 2.0)
    }
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is clamped to at least one
    #[must_use]
    pub fn new(max_attempts: u32, initial_backoff_ms: u64, max_backoff_ms: u64, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms.max(initial_backoff_ms)),
            multiplier: if multiplier.is_finite() && multiplier >= 1.0 {
                multiplier
            } else {
                1.0
            },
        }
    }

    /// Retry immediately, up to `max_attempts` total attempts
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, 0, 0, 1.0)
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Check if another attempt is allowed after `attempts_made` attempts
    #[must_use]
    pub const fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Upper bound of the delay before retry number `retry` (0-indexed)
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.min(i32::MAX as u32) as i32;
        let micros = self.initial_backoff.as_micros() as f64 * self.multiplier.powi(exponent);
        if !micros.is_finite() || micros >= self.max_backoff.as_micros() as f64 {
            return self.max_backoff;
        }
        Duration::from_micros(micros as u64)
    }

    /// Delay before retry number `retry`, drawn uniformly from the upper half
    /// of [`delay_for_retry`](Self::delay_for_retry) so colliding writers spread out
    #[must_use]
    pub fn jittered_delay(&self, retry: u32) -> Duration {
        let ceiling = self.delay_for_retry(retry);
        if ceiling.is_zero() {
            return ceiling;
        }
        let ceiling_us = ceiling.as_micros().min(u128::from(u64::MAX)) as u64;
        let floor_us = ceiling_us / 2;
        Duration::from_micros(rand::thread_rng().gen_range(floor_us..=ceiling_us))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::new(5, 10, 1_000, 2.0);

        assert_eq!(policy.delay_for_retry(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(40));
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(80));
    }

    #[test]
    fn test_max_delay() {
        let policy = RetryPolicy::new(10, 100, 300, 2.0);
        assert_eq!(policy.delay_for_retry(5), Duration::from_millis(300));
        assert_eq!(policy.delay_for_retry(u32::MAX), Duration::from_millis(300));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::new(5, 40, 1_000, 2.0);
        for _ in 0..100 {
            let delay = policy.jittered_delay(1);
            assert!(delay >= Duration::from_millis(40));
            assert!(delay <= Duration::from_millis(80));
        }
        assert_eq!(RetryPolicy::immediate(3).jittered_delay(2), Duration::ZERO);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::immediate(3);

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn test_degenerate_values_are_clamped() {
        let policy = RetryPolicy::new(0, 50, 10, f64::NAN);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_for_retry(3), Duration::from_millis(50));
    }
}
