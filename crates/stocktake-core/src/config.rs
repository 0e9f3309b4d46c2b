//! Environment-driven configuration for the source connection.

use std::time::Duration;

use crate::error::SourceError;
use crate::retry::{Backoff, RetryConfig};
use crate::throttle::RateLimitConfig;

pub const ENV_SOURCE_URL: &str = "STOCKTAKE_SOURCE_URL";
pub const ENV_SOURCE_USER: &str = "STOCKTAKE_SOURCE_USER";
pub const ENV_SOURCE_KEY: &str = "STOCKTAKE_SOURCE_KEY";
pub const ENV_RATE_BURST: &str = "STOCKTAKE_RATE_BURST";
pub const ENV_RATE_PER_SEC: &str = "STOCKTAKE_RATE_PER_SEC";

/// Connection settings for the external inventory source.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL, e.g. `https://inventory.example.com/api/v2`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout_ms: u64,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
}

impl SourceConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let base_url = base_url.into();
        let username = username.into();
        let password = password.into();

        if base_url.trim().is_empty() {
            return Err(SourceError::configuration("source base URL is empty"));
        }
        if username.trim().is_empty() || password.trim().is_empty() {
            return Err(SourceError::configuration("source credentials are empty"));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            timeout_ms: 10_000,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
        })
    }

    /// Read configuration from the environment. Missing credentials are a
    /// fatal configuration error surfaced before any network call.
    pub fn from_env() -> Result<Self, SourceError> {
        let base_url = require_env(ENV_SOURCE_URL)?;
        let username = require_env(ENV_SOURCE_USER)?;
        let password = require_env(ENV_SOURCE_KEY)?;
        let mut config = Self::new(base_url, username, password)?;

        if let Some(burst) = env_parse::<u32>(ENV_RATE_BURST) {
            config.rate_limit.burst = burst;
        }
        if let Some(per_second) = env_parse::<f64>(ENV_RATE_PER_SEC) {
            config.rate_limit.per_second = per_second;
        }
        Ok(config)
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Deterministic retry profile for tests.
    pub fn with_fast_retry(mut self) -> Self {
        self.retry = RetryConfig {
            max_retries: 1,
            backoff: Backoff {
                base: Duration::from_millis(1),
                max: Duration::from_millis(2),
                jitter: false,
            },
            ..RetryConfig::default()
        };
        self
    }
}

fn require_env(name: &str) -> Result<String, SourceError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SourceError::configuration(format!(
            "missing required environment variable {name}"
        ))),
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}
