//! Minimum-interval rate limiter owned by each adapter instance.

use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorLimiter};
use tracing::debug;

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Enforces a minimum interval between consecutive calls to [`RateLimiter::acquire`].
///
/// Backed by a burst-of-one GCRA quota, so concurrent callers are released
/// one interval apart. A zero interval never waits.
pub struct RateLimiter {
    min_interval: Duration,
    limiter: Option<DirectLimiter>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval).map(GovernorLimiter::direct);
        Self {
            min_interval,
            limiter,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the next permit. Returns how long the caller was held back.
    pub async fn acquire(&self) -> Duration {
        let Some(limiter) = &self.limiter else {
            return Duration::ZERO;
        };

        let start = Instant::now();
        limiter.until_ready().await;
        let waited = start.elapsed();

        if waited >= Duration::from_millis(1) {
            debug!(wait_ms = waited.as_millis() as u64, "rate limit: waited");
        }
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn first_call_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        assert!(limiter.acquire().await < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn second_call_waits_for_remainder() {
        let limiter = RateLimiter::new(Duration::from_millis(120));
        limiter.acquire().await;

        let start = Instant::now();
        let waited = limiter.acquire().await;
        assert!(waited > Duration::ZERO);
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn concurrent_callers_are_spaced() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(60)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // Three calls need at least two full intervals between them.
        assert!(start.elapsed() >= Duration::from_millis(110));
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let limiter = RateLimiter::new(Duration::ZERO);
        limiter.acquire().await;
        assert_eq!(limiter.acquire().await, Duration::ZERO);
        assert_eq!(limiter.min_interval(), Duration::ZERO);
    }
}
