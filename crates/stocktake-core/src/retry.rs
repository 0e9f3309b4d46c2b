//! Backoff policy for retrying throttled or failing source calls.

use std::time::Duration;

/// Exponential backoff with full jitter.
///
/// The nominal delay for attempt `n` is `base * 2^n`, capped at `max`; the
/// actual sleep is drawn uniformly from `0..=nominal` so simultaneous
/// retriers spread out instead of hammering the source in lockstep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Initial (attempt 0) nominal delay.
    pub base: Duration,
    /// Upper bound on the nominal delay.
    pub max: Duration,
    /// Whether to apply full jitter. Disabled only in tests that need
    /// deterministic delays.
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Nominal (pre-jitter) delay for a 0-based attempt number.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let scale = 2f64.powi(attempt.min(31) as i32);
        let seconds = self.base.as_secs_f64() * scale;
        Duration::from_secs_f64(seconds.min(self.max.as_secs_f64()))
    }

    /// Jittered delay to actually sleep for.
    pub fn delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        if !self.jitter {
            return nominal;
        }
        let nominal_ms = nominal.as_millis() as u64;
        Duration::from_millis(fastrand::u64(0..=nominal_ms))
    }
}

/// Retry configuration for the rate-limited client.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// HTTP status codes that trigger a retry.
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on_status: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }
}
