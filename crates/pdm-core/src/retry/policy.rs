use std::time::Duration;

use crate::config::Settings;

/// Exponential backoff between automatic attempts, clamped to
/// `[min_delay, max_delay]`. A server-provided `Retry-After` replaces the
/// computed delay but is clamped the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of failed attempts before the download fails for good.
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_attempts: settings.max_download_retries,
            min_delay: settings.min_retry_after(),
            max_delay: settings.max_retry_after(),
        }
    }

    /// Whether another attempt is allowed after `num_failed` failures.
    pub fn should_retry(&self, num_failed: u32) -> bool {
        num_failed < self.max_attempts
    }

    /// Delay before the attempt that follows failure number `num_failed` (1-based).
    pub fn delay(&self, num_failed: u32, server_retry_after: Option<Duration>) -> Duration {
        let raw = match server_retry_after {
            Some(d) => d,
            None => {
                let exp = 1u32 << num_failed.saturating_sub(1).min(16);
                self.min_delay.saturating_mul(exp)
            }
        };
        raw.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            min_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(24 * 3600),
        }
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let p = policy();
        assert_eq!(p.delay(1, None), Duration::from_secs(30));
        assert_eq!(p.delay(2, None), Duration::from_secs(60));
        assert_eq!(p.delay(3, None), Duration::from_secs(120));
        assert_eq!(p.delay(40, None), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn server_retry_after_is_clamped() {
        let p = policy();
        assert_eq!(p.delay(1, Some(Duration::from_secs(300))), Duration::from_secs(300));
        assert_eq!(p.delay(3, Some(Duration::from_secs(1))), Duration::from_secs(30));
        assert_eq!(
            p.delay(1, Some(Duration::from_secs(7 * 24 * 3600))),
            Duration::from_secs(24 * 3600)
        );
    }

    #[test]
    fn respects_max_attempts() {
        let p = policy();
        assert!(p.should_retry(4));
        assert!(!p.should_retry(5));
    }

    #[test]
    fn from_settings_uses_bounds() {
        let mut s = Settings::default();
        s.min_retry_after_ms = 10;
        s.max_retry_after_ms = 5;
        let p = RetryPolicy::from_settings(&s);
        assert_eq!(p.min_delay, Duration::from_millis(10));
        assert_eq!(p.max_delay, Duration::from_millis(10));
        assert_eq!(p.delay(1, None), Duration::from_millis(10));
    }
}
