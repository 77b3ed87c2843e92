//! Per-connection sliding-window rate limiting, and backoff after throttling.
//!
//! Each connection gets one [`SlidingWindowLimiter`] shared by every adapter
//! call made for it. A caller that finds the window full waits until the
//! oldest request leaves the window; it is delayed, never rejected.
//!
//! [`RetryPolicy`] decides how long to wait after a retryable failure, and
//! [`parse_retry_after`] reads the provider's own hint on a 429.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use staysync_core::types::DbId;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Length of the sliding window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window limiter: at most `budget` acquisitions in any `window`.
///
/// Waiters queue on a fair mutex and the head of the queue sleeps while
/// holding it, so callers are served in arrival order.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    budget: usize,
    window: Duration,
    issued: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    /// Limiter with a per-minute budget. A budget of zero is treated as one.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self::with_window(requests_per_minute, WINDOW)
    }

    pub fn with_window(budget: u32, window: Duration) -> Self {
        let budget = budget.max(1) as usize;
        Self {
            budget,
            window,
            issued: Mutex::new(VecDeque::with_capacity(budget)),
        }
    }

    pub fn budget(&self) -> u32 {
        self.budget as u32
    }

    /// Wait for capacity, then record one request.
    pub async fn acquire(&self) {
        let mut issued = self.issued.lock().await;
        loop {
            let now = Instant::now();
            while issued
                .front()
                .is_some_and(|t| now.duration_since(*t) >= self.window)
            {
                issued.pop_front();
            }
            if issued.len() < self.budget {
                issued.push_back(now);
                return;
            }
            let Some(oldest) = issued.front().copied() else {
                continue;
            };
            let wake_at = oldest + self.window;
            debug!(
                budget = self.budget,
                wait_ms = wake_at.saturating_duration_since(now).as_millis() as u64,
                "Rate limit window full, waiting"
            );
            tokio::time::sleep_until(wake_at).await;
        }
    }

    /// Requests currently counted in the window.
    pub async fn in_window(&self) -> usize {
        let issued = self.issued.lock().await;
        let now = Instant::now();
        issued
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}

/// One limiter per connection, shared by every run and adapter for it.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    limiters: Mutex<HashMap<DbId, Arc<SlidingWindowLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The connection's limiter, created on first use. A changed budget
    /// replaces the limiter.
    pub async fn limiter_for(
        &self,
        connection_id: DbId,
        requests_per_minute: u32,
    ) -> Arc<SlidingWindowLimiter> {
        let mut limiters = self.limiters.lock().await;
        let wanted = requests_per_minute.max(1);
        match limiters.get(&connection_id) {
            Some(existing) if existing.budget() == wanted => Arc::clone(existing),
            _ => {
                let limiter = Arc::new(SlidingWindowLimiter::per_minute(wanted));
                limiters.insert(connection_id, Arc::clone(&limiter));
                limiter
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Retry backoff
// ---------------------------------------------------------------------------

/// Bounded exponential backoff for retryable provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. `1` disables retrying.
    pub max_attempts: u32,
    /// Wait after the first failure; doubles after each further one.
    pub base_delay: Duration,
    /// Cap on any single wait, a provider's Retry-After included.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether another attempt is allowed after `failed` failed attempts.
    pub fn allows_retry(&self, failed: u32) -> bool {
        failed < self.max_attempts
    }

    /// Wait before the next attempt after `failed` failed attempts.
    ///
    /// A provider hint replaces the exponential delay; both are capped.
    pub fn backoff(&self, failed: u32, retry_after: Option<Duration>) -> Duration {
        let doublings = failed.saturating_sub(1).min(16);
        let exponential = self.base_delay.saturating_mul(1 << doublings);
        retry_after.unwrap_or(exponential).min(self.max_delay)
    }
}

/// Parse a `Retry-After` header: delta-seconds or an HTTP date.
///
/// A date in the past yields a zero wait.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use tokio::task::JoinSet;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn call_over_budget_is_delayed_not_dropped() {
        let limiter = SlidingWindowLimiter::per_minute(100);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        limiter.acquire().await;
        assert!(start.elapsed() >= WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_never_exceed_budget_in_any_window() {
        let limiter = Arc::new(SlidingWindowLimiter::per_minute(10));
        let start = Instant::now();
        let mut tasks = JoinSet::new();
        for _ in 0..35 {
            let limiter = Arc::clone(&limiter);
            tasks.spawn(async move {
                limiter.acquire().await;
                Instant::now()
            });
        }

        let mut times = Vec::new();
        while let Some(t) = tasks.join_next().await {
            times.push(t.unwrap());
        }
        times.sort();
        assert_eq!(times.len(), 35);

        for (i, t) in times.iter().enumerate() {
            let in_window = times[i..]
                .iter()
                .take_while(|u| u.duration_since(*t) < WINDOW)
                .count();
            assert!(in_window <= 10, "{in_window} calls in one window");
        }
        assert!(times[34].duration_since(start) >= WINDOW * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn window_frees_capacity() {
        let limiter = SlidingWindowLimiter::with_window(2, Duration::from_secs(10));
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(limiter.in_window().await, 2);
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(limiter.in_window().await, 0);
    }

    #[tokio::test]
    async fn registry_shares_one_limiter_per_connection() {
        let registry = RateLimiterRegistry::new();
        let a = registry.limiter_for(1, 60).await;
        let b = registry.limiter_for(1, 60).await;
        let other = registry.limiter_for(2, 60).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));

        let resized = registry.limiter_for(1, 30).await;
        assert_eq!(resized.budget(), 30);
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
        };
        assert_eq!(policy.backoff(1, None), Duration::from_secs(1));
        assert_eq!(policy.backoff(2, None), Duration::from_secs(2));
        assert_eq!(policy.backoff(3, None), Duration::from_secs(3));
        assert_eq!(policy.backoff(40, None), Duration::from_secs(3));
        assert!(policy.allows_retry(4));
        assert!(!policy.allows_retry(5));
        assert!(!RetryPolicy::none().allows_retry(1));
    }

    #[test]
    fn retry_after_hint_wins_but_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff(1, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.backoff(1, Some(Duration::from_secs(3600))),
            policy.max_delay
        );
    }

    #[test]
    fn retry_after_formats() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon"), None);
    }
}
