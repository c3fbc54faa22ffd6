use crate::config::RetryConfig;
use std::time::Duration;

/// Retry parameters for one artifact download.
///
/// Foreground: up to `max_attempts` automatic retries, immediately, then the
/// download fails with a classified error. Background: unbounded retries with
/// exponential backoff, so the user never sees an error they cannot act on.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum automatic retries while foregrounded.
    pub max_attempts: u32,
    /// Base delay for backoff between backgrounded retries.
    pub background_base_delay: Duration,
    /// Upper bound on backoff between backgrounded retries.
    pub background_max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            background_base_delay: Duration::from_millis(250),
            background_max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            background_base_delay: Duration::from_secs_f64(cfg.background_base_delay_secs),
            background_max_delay: Duration::from_secs(cfg.background_max_delay_secs),
        }
    }

    /// True when a failure with `retry_count` prior retries may retry again
    /// in the foreground. The caller increments its count on each retry.
    pub fn allows_foreground_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_attempts
    }

    /// Backoff before backgrounded retry number `attempt` (0-based):
    /// base * 2^attempt, capped.
    pub fn background_delay(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.min(8);
        self.background_base_delay
            .saturating_mul(exp)
            .min(self.background_max_delay)
    }
}
