//! Per-key sliding-window rate limiting.
//!
//! [`RateLimiter::acquire`] suspends until the number of acquisitions for
//! the key within the last 60 seconds is below the configured limit, then
//! records a fresh timestamp. Independent keys never contend; concurrent
//! callers on the same key serialize through a per-key mutex, so waiters
//! are admitted deterministically in lock-acquisition order. Cancelling a
//! waiting caller records nothing.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use crate::constants::RATE_LIMIT_WINDOW;

type Window = Arc<AsyncMutex<VecDeque<Instant>>>;

/// Sliding-window admission control, one window per string key.
pub struct RateLimiter {
    requests_per_minute: usize,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(requests_per_minute: usize) -> Self {
        Self {
            requests_per_minute: requests_per_minute.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide limiter shared by all adapters. The limit is read from
    /// `RATE_LIMIT_REQUESTS_PER_MINUTE` once, on first use.
    pub fn global() -> &'static RateLimiter {
        static GLOBAL: OnceLock<RateLimiter> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let limit = std::env::var("RATE_LIMIT_REQUESTS_PER_MINUTE")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(60);
            RateLimiter::new(limit)
        })
    }

    fn window(&self, key: &str) -> Window {
        let mut windows = self.windows.lock();
        Arc::clone(
            windows
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(VecDeque::new()))),
        )
    }

    /// Wait until a request under `key` is admissible, then record it.
    pub async fn acquire(&self, key: &str) {
        let window = self.window(key);
        let mut timestamps = window.lock().await;

        loop {
            let now = Instant::now();
            while timestamps
                .front()
                .is_some_and(|t| now.duration_since(*t) >= RATE_LIMIT_WINDOW)
            {
                timestamps.pop_front();
            }

            if timestamps.len() < self.requests_per_minute {
                timestamps.push_back(Instant::now());
                return;
            }

            // The window is full; sleep until the oldest entry ages out.
            // The per-key lock is held across the sleep so waiters drain
            // in order.
            let Some(oldest) = timestamps.front().copied() else {
                continue;
            };
            let wait = RATE_LIMIT_WINDOW.saturating_sub(now.duration_since(oldest));
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of recorded acquisitions currently inside the window for
    /// `key`. Intended for diagnostics and tests.
    pub async fn in_flight(&self, key: &str) -> usize {
        let window = self.window(key);
        let timestamps = window.lock().await;
        let now = Instant::now();
        timestamps
            .iter()
            .filter(|t| now.duration_since(**t) < RATE_LIMIT_WINDOW)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_under_limit_is_immediate() {
        let limiter = RateLimiter::new(5);
        for _ in 0..5 {
            limiter.acquire("k").await;
        }
        assert_eq!(limiter.in_flight("k").await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_when_window_full() {
        let limiter = RateLimiter::new(2);
        limiter.acquire("k").await;
        limiter.acquire("k").await;

        let before = Instant::now();
        limiter.acquire("k").await;
        let waited = before.elapsed();

        // Third acquisition must wait for the first timestamp to age out.
        assert!(waited >= Duration::from_secs(59));
        assert!(limiter.in_flight("k").await <= 2);
    }

    #[tokio::test]
    async fn test_independent_keys_do_not_contend() {
        let limiter = RateLimiter::new(1);
        limiter.acquire("a").await;
        // A different key admits immediately even though "a" is saturated.
        tokio::time::timeout(Duration::from_millis(100), limiter.acquire("b"))
            .await
            .expect("key b should not wait on key a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_pruned() {
        let limiter = RateLimiter::new(1);
        limiter.acquire("k").await;
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.in_flight("k").await, 0);
        // And the slot is free again.
        tokio::time::timeout(Duration::from_secs(1), limiter.acquire("k"))
            .await
            .expect("slot should be free after the window passed");
    }

    #[tokio::test]
    async fn test_concurrent_acquires_serialize() {
        let limiter = Arc::new(RateLimiter::new(64));
        let mut handles = Vec::new();
        for _ in 0..32 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire("shared").await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(limiter.in_flight("shared").await, 32);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_records_nothing() {
        let limiter = Arc::new(RateLimiter::new(1));
        limiter.acquire("k").await;

        let waiter = {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.acquire("k").await })
        };
        tokio::task::yield_now().await;
        waiter.abort();
        let _ = waiter.await;

        assert_eq!(limiter.in_flight("k").await, 1);
    }

    #[test]
    fn test_zero_limit_clamps_to_one() {
        let limiter = RateLimiter::new(0);
        assert_eq!(limiter.requests_per_minute, 1);
    }
}
