//! Retry schedule for network-level portal failures

use std::time::Duration;

use crate::config::RetrySettings;

/// Exponential backoff: `base`, `base * factor`, `base * factor^2`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            factor: 4,
        }
    }
}

impl RetryPolicy {
    /// No retries and no waiting (used by tests and one-shot probes)
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            factor: 1,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(8);
        self.base_delay
            .saturating_mul(self.factor.max(1).saturating_pow(exp))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            factor: settings.backoff_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(800));
    }

    #[test]
    fn test_large_retry_counts_do_not_overflow() {
        let policy = RetryPolicy {
            max_retries: 50,
            base_delay: Duration::from_secs(1),
            factor: 10,
        };
        assert!(policy.delay_for(40) >= policy.delay_for(2));
    }
}
