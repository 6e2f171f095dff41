//! Pacing and retry for live metadata lookups
//!
//! Request pacing is a token bucket owned by the API client; callers never
//! sleep between requests themselves. Failed lookups are retried on an
//! exponential backoff schedule with a bounded attempt budget. Tests use an
//! unthrottled pacer so nothing blocks.

use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Result;
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use tracing::warn;

/// Token bucket gating every live request to the metadata service
pub struct LookupPacer {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl LookupPacer {
    pub fn new(requests_per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)),
        }
    }

    /// Jikan allows 3 requests per second; stay a notch under it
    pub fn jikan() -> Self {
        Self::new(2, 3)
    }

    /// Never blocks, for tests and offline fixtures
    pub fn unthrottled() -> Self {
        Self::new(10_000, 10_000)
    }

    /// Wait until the next request may go out
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

/// Statuses worth another attempt: rate limiting, request timeout, and any
/// server-side failure
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Backoff schedule for retrying failed lookups
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first included
    pub attempts: u32,
    pub first_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            first_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.first_delay,
            max_interval: self.max_delay,
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..ExponentialBackoff::default()
        }
    }

    /// Run `operation`, retrying on error until the attempt budget or the
    /// backoff schedule runs out
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut schedule = self.schedule();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let delay = schedule.next_backoff().filter(|_| attempt < self.attempts);
            let Some(delay) = delay else {
                warn!(
                    operation = name,
                    attempts = attempt,
                    error = %error,
                    "Lookup failed, giving up"
                );
                return Err(error);
            };

            warn!(
                operation = name,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Lookup failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_unthrottled_pacer_never_blocks() {
        let pacer = LookupPacer::unthrottled();
        let start = std::time::Instant::now();
        for _ in 0..50 {
            pacer.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failures() {
        let policy = RetryPolicy {
            attempts: 3,
            first_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);

        let result = policy
            .run("test-op", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("flaky");
                }
                Ok(7)
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_at_the_attempt_budget() {
        let policy = RetryPolicy {
            attempts: 2,
            first_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);

        let result: Result<()> = policy
            .run("test-op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("still down");
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
