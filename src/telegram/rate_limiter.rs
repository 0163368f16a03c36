//! Rate limiter for outgoing Bot API calls.
//!
//! Spaces calls by a minimum interval and lets a flood wait from Telegram
//! hold back every caller, not just the one that hit it.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rate limiter that enforces minimum intervals between operations.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum duration between allowed operations.
    min_interval: Duration,

    /// Earliest time the next operation may start.
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    /// Waits until an operation is allowed, then reserves the next slot.
    ///
    /// Returns the duration waited (0 if no wait was needed).
    pub async fn wait_and_acquire(&self) -> Duration {
        let mut next = self.next_allowed.lock().await;

        let now = Instant::now();
        let wait_duration = next
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);

        if !wait_duration.is_zero() {
            log::debug!(
                "Rate limiter: waiting {:?} before next operation",
                wait_duration
            );
            tokio::time::sleep(wait_duration).await;
        }

        *next = Some(Instant::now() + self.min_interval);
        wait_duration
    }

    /// Holds back all operations for `wait` after a flood wait from Telegram.
    pub async fn handle_flood_wait(&self, wait: Duration) {
        log::warn!("Received flood wait from Telegram: {:?}", wait);
        let mut next = self.next_allowed.lock().await;
        let until = Instant::now() + wait;
        if next.is_none_or(|at| at < until) {
            *next = Some(until);
        }
    }
}
