//! Minimum-spacing gate for registry requests.
//!
//! The SEC publishes its fair-access policy as a minimum spacing between
//! requests rather than a burst quota, so this is a plain monotonic-clock gate
//! instead of a token bucket.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

/// Default spacing between registry requests (SEC allows 10 req/sec).
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(100);

/// Rate limiter ensuring a minimum interval between consecutive requests.
#[derive(Debug)]
pub struct RateLimiter {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    /// Create a limiter with the given minimum interval.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_request: None,
            min_interval,
        }
    }

    /// Minimum interval enforced between two `acquire` returns.
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until `min_interval` has elapsed since the previous call returned.
    ///
    /// The first call returns immediately.
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// A [`RateLimiter`] shared between tasks.
///
/// The whole "check elapsed, sleep, record timestamp" sequence runs while
/// holding the lock, so concurrent callers are serialized through the gate.
#[derive(Debug, Clone)]
pub struct SharedRateLimiter {
    inner: Arc<Mutex<RateLimiter>>,
}

impl SharedRateLimiter {
    /// Create a shared limiter with the given minimum interval.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiter::new(min_interval))),
        }
    }

    /// Wait for this caller's turn through the gate.
    pub async fn acquire(&self) {
        self.inner.lock().await.acquire().await;
    }
}

impl Default for SharedRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: Duration = Duration::from_millis(2);

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let mut limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_consecutive_acquires_are_spaced() {
        let delay = Duration::from_millis(60);
        let mut limiter = RateLimiter::new(delay);

        limiter.acquire().await;
        let mut previous = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
            let now = Instant::now();
            assert!(now - previous >= delay - TOLERANCE, "gap was {:?}", now - previous);
            previous = now;
        }
    }

    #[tokio::test]
    async fn test_no_wait_after_idle_period() {
        let delay = Duration::from_millis(30);
        let mut limiter = RateLimiter::new(delay);
        limiter.acquire().await;
        sleep(Duration::from_millis(50)).await;

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < delay);
    }

    #[tokio::test]
    async fn test_shared_limiter_serializes_tasks() {
        let delay = Duration::from_millis(40);
        let limiter = SharedRateLimiter::new(delay);
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut stamps = Vec::new();
        for handle in handles {
            stamps.push(handle.await.unwrap());
        }
        stamps.sort();

        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= delay - TOLERANCE);
        }
        assert!(start.elapsed() >= delay * 3 - TOLERANCE);
    }
}
