//! Fixed-window rate limiter.
//!
//! Each client key gets a counter and a reset instant. The first hit opens a
//! window; hits inside the window increment the counter; the first hit after
//! the window closes starts a fresh one. State lives in process memory only.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

/// Prune expired entries once the map grows past this many keys.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Record a hit for `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        // A poisoned lock only means another request panicked mid-update;
        // the counters are still usable.
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if windows.len() >= PRUNE_THRESHOLD {
            windows.retain(|_, w| w.reset_at > now);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            reset_at: now + self.window,
        });

        if now > window.reset_at {
            window.count = 0;
            window.reset_at = now + self.window;
        }

        window.count += 1;
        if window.count > self.limit {
            RateDecision::Limited {
                retry_after: window.reset_at.saturating_duration_since(now),
            }
        } else {
            RateDecision::Allowed {
                remaining: self.limit - window.count,
            }
        }
    }

    #[cfg(test)]
    pub fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();

        assert_eq!(limiter.check_at("1.2.3.4", now), RateDecision::Allowed { remaining: 2 });
        assert_eq!(limiter.check_at("1.2.3.4", now), RateDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at("1.2.3.4", now), RateDecision::Allowed { remaining: 0 });
        assert!(matches!(
            limiter.check_at("1.2.3.4", now),
            RateDecision::Limited { .. }
        ));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(matches!(limiter.check_at("a", now), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check_at("b", now), RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check_at("a", now), RateDecision::Limited { .. }));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let start = Instant::now();

        assert!(matches!(limiter.check_at("k", start), RateDecision::Allowed { .. }));
        assert!(matches!(
            limiter.check_at("k", start + Duration::from_secs(5)),
            RateDecision::Limited { .. }
        ));
        assert_eq!(
            limiter.check_at("k", start + Duration::from_secs(11)),
            RateDecision::Allowed { remaining: 0 }
        );
    }

    #[test]
    fn retry_after_counts_down_to_reset() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));
        let start = Instant::now();

        match limiter.check_at("k", start + Duration::from_secs(0)) {
            RateDecision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(60)),
            other => panic!("expected limit, got {other:?}"),
        }
        match limiter.check_at("k", start + Duration::from_secs(45)) {
            RateDecision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(15)),
            other => panic!("expected limit, got {other:?}"),
        }
    }

    #[test]
    fn tracks_one_entry_per_key() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.check("a");
        limiter.check("a");
        limiter.check("b");
        assert_eq!(limiter.tracked_keys(), 2);
    }
}
