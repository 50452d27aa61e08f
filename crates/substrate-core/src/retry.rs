//! Retry and backoff helpers.

use std::time::Duration;

/// Exponential backoff configuration with jitter.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            jitter_fraction: 0.2,
        }
    }
}

impl RetryConfig {
    /// Delay to use before the given attempt (0-indexed), before jitter.
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exp = 2u32.saturating_pow(attempt);
        let scaled = self.base_delay.saturating_mul(exp);
        scaled.min(self.max_delay)
    }

    /// Delay with deterministic jitter derived from `attempt`, so callers
    /// don't need a source of randomness to get test-stable behavior.
    #[must_use]
    pub fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.backoff_for_attempt(attempt);
        let jitter_ratio = 1.0 - self.jitter_fraction / 2.0;
        let millis = (base.as_millis() as f64) * jitter_ratio;
        Duration::from_millis(millis as u64)
    }

    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        let cfg = RetryConfig::default();
        assert!(cfg.backoff_for_attempt(1) > cfg.backoff_for_attempt(0));
        assert!(cfg.backoff_for_attempt(2) > cfg.backoff_for_attempt(1));
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.backoff_for_attempt(20), cfg.max_delay);
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let cfg = RetryConfig {
            max_attempts: 3,
            ..RetryConfig::default()
        };
        assert!(cfg.should_retry(0));
        assert!(cfg.should_retry(1));
        assert!(!cfg.should_retry(2));
    }
}
