//! Rate-limited HTTP client for source-system calls.
//!
//! One [`RateLimitedClient`] (and therefore one token bucket) is shared by
//! every logical caller in the process — engine runs, cache warm-ups, and
//! manual debug fetches all draw from the same budget so the aggregate
//! outbound rate stays inside the source system's limits.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::retry::RetryConfig;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket sizing. Values come from configuration, never hardcoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Bucket capacity (burst size), N tokens.
    pub burst: u32,
    /// Steady-state refill rate, R tokens per second.
    pub per_second: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 5,
            per_second: 2.0,
        }
    }
}

impl RateLimitConfig {
    fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.burst.max(1)).expect("burst clamped to >= 1");
        let rate = self.per_second.max(0.001);
        let period = Duration::from_secs_f64(1.0 / rate);
        Quota::with_period(period)
            .expect("period is always greater than zero")
            .allow_burst(burst)
    }
}

/// HTTP client wrapper that throttles via a shared token bucket and retries
/// 429/5xx responses with capped, fully jittered exponential backoff.
#[derive(Clone)]
pub struct RateLimitedClient {
    transport: Arc<dyn HttpClient>,
    limiter: Arc<DirectRateLimiter>,
    retry: RetryConfig,
}

impl RateLimitedClient {
    pub fn new(transport: Arc<dyn HttpClient>, limits: RateLimitConfig, retry: RetryConfig) -> Self {
        Self {
            transport,
            limiter: Arc::new(RateLimiter::direct(limits.quota())),
            retry,
        }
    }

    /// Execute a request, blocking on the token bucket until admitted.
    ///
    /// Retryable responses (per [`RetryConfig`]) are retried up to the
    /// configured limit; the final response is surfaced to the caller even
    /// when its status is still an error, so the adapter can classify it.
    pub async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, SourceError> {
        self.fetch_inner(request, true).await
    }

    /// Non-blocking variant: fails with a rate-limit error instead of
    /// waiting when the bucket has no token available.
    pub async fn try_fetch(&self, request: HttpRequest) -> Result<HttpResponse, SourceError> {
        self.fetch_inner(request, false).await
    }

    async fn fetch_inner(
        &self,
        request: HttpRequest,
        blocking: bool,
    ) -> Result<HttpResponse, SourceError> {
        let mut attempt: u32 = 0;
        loop {
            // Every attempt is an outbound call and draws its own token.
            if blocking {
                self.limiter.until_ready().await;
            } else if self.limiter.check().is_err() {
                return Err(SourceError::rate_limited(
                    "token bucket empty and non-blocking fetch requested",
                ));
            }

            match self.transport.execute(request.clone()).await {
                Ok(response) => {
                    if response.is_success() || !self.retry.should_retry_status(response.status) {
                        return Ok(response);
                    }
                    if attempt >= self.retry.max_retries {
                        warn!(
                            status = response.status,
                            attempts = attempt + 1,
                            url = %request.url,
                            "giving up after retryable status"
                        );
                        return Ok(response);
                    }
                    let delay = self.retry.backoff.delay(attempt);
                    debug!(
                        status = response.status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying throttled/failed source call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if !err.retryable() || attempt >= self.retry.max_retries {
                        return Err(err);
                    }
                    let delay = self.retry.backoff.delay(attempt);
                    debug!(error = %err, attempt, "retrying after transport error");
                    tokio::time::sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }
}
