// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiters.
//!
//! Two admission styles are provided:
//! 1. [`WindowLimiter::hit`] counts every request, rejected ones included,
//!    and rejects once the count passes the cap (the gatekeeper).
//! 2. [`WindowLimiter::try_admit`] and [`GlobalWindow::try_admit`] reject at
//!    the cap without counting the rejected request (the presence proxy).
//!
//! A window resets once strictly more than its length has elapsed since it
//! started.

use crate::clock::Clock;
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Client key used when no forwarded-address header is present.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining requests in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        /// Reason for rate limiting
        reason: RateLimitReason,
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// Reason for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    /// A single client exceeded its cap
    ClientRateExceeded,
    /// All clients together exceeded the global cap
    GlobalRateExceeded,
}

impl std::fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientRateExceeded => write!(f, "Client rate limit exceeded"),
            Self::GlobalRateExceeded => write!(f, "Global rate limit exceeded"),
        }
    }
}

/// Request count within one window.
#[derive(Debug, Clone, Copy)]
struct FixedWindow {
    count: u32,
    window_start: Instant,
}

impl FixedWindow {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) > window
    }

    fn reset_if_expired(&mut self, now: Instant, window: Duration) {
        if self.is_expired(now, window) {
            self.count = 0;
            self.window_start = now;
        }
    }

    fn reset_in(&self, now: Instant, window: Duration) -> Duration {
        window.saturating_sub(now.saturating_duration_since(self.window_start))
    }

    /// Count the request, then decide.
    fn hit(&mut self, now: Instant, window: Duration, limit: u32) -> RateLimitResult {
        self.reset_if_expired(now, window);
        self.count = self.count.saturating_add(1);

        if self.count > limit {
            RateLimitResult::Limited {
                reason: RateLimitReason::ClientRateExceeded,
                retry_after: self.reset_in(now, window),
            }
        } else {
            RateLimitResult::Allowed {
                remaining: limit - self.count,
                reset_in: self.reset_in(now, window),
            }
        }
    }

    /// Decide, then count the request only if it was admitted.
    fn admit(
        &mut self,
        now: Instant,
        window: Duration,
        limit: u32,
        reason: RateLimitReason,
    ) -> RateLimitResult {
        self.reset_if_expired(now, window);

        if self.count >= limit {
            return RateLimitResult::Limited {
                reason,
                retry_after: self.reset_in(now, window),
            };
        }

        self.count += 1;
        RateLimitResult::Allowed {
            remaining: limit - self.count,
            reset_in: self.reset_in(now, window),
        }
    }
}

/// Thread-safe keyed fixed-window limiter.
pub struct WindowLimiter {
    limit: u32,
    window: Duration,
    entries: Arc<RwLock<HashMap<String, FixedWindow>>>,
    clock: Arc<dyn Clock>,
}

impl WindowLimiter {
    /// Create a limiter allowing `limit` requests per `window` per key.
    pub fn new(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit,
            window,
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Count a request for `key` and reject it if the window's count is now
    /// over the cap.
    pub async fn hit(&self, key: &str) -> RateLimitResult {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| FixedWindow::new(now));

        let result = entry.hit(now, self.window, self.limit);
        if !result.is_allowed() {
            debug!(client = %key, count = entry.count, "Client over request cap");
        }
        result
    }

    /// Admit a request for `key` if the window still has room.
    pub async fn try_admit(&self, key: &str) -> RateLimitResult {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| FixedWindow::new(now));

        entry.admit(
            now,
            self.window,
            self.limit,
            RateLimitReason::ClientRateExceeded,
        )
    }

    /// Drop every record whose window has expired. Returns how many were
    /// removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, self.window));
        before - entries.len()
    }

    /// Number of clients currently tracked.
    pub async fn tracked(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Requests counted for `key` in its current window.
    pub async fn count(&self, key: &str) -> Option<u32> {
        self.entries.read().await.get(key).map(|entry| entry.count)
    }
}

/// A single un-keyed window bounding volume across all clients.
pub struct GlobalWindow {
    limit: u32,
    window: Duration,
    state: Mutex<FixedWindow>,
    clock: Arc<dyn Clock>,
}

impl GlobalWindow {
    pub fn new(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            limit,
            window,
            state: Mutex::new(FixedWindow::new(now)),
            clock,
        }
    }

    pub async fn try_admit(&self) -> RateLimitResult {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.admit(
            now,
            self.window,
            self.limit,
            RateLimitReason::GlobalRateExceeded,
        )
    }
}

/// Extracts the client address from forwarding headers: the first hop of
/// `X-Forwarded-For`, then `X-Real-IP`, then `Remote-Addr`.
pub fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(first.to_string());
    }

    ["x-real-ip", "remote-addr"].iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

/// Client key for rate limiting, falling back to [`ANONYMOUS_CLIENT`].
pub fn client_key(headers: &HeaderMap) -> String {
    forwarded_client(headers).unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use axum::http::HeaderValue;

    fn limiter(limit: u32, window_secs: u64) -> (WindowLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = WindowLimiter::new(limit, Duration::from_secs(window_secs), clock.clone());
        (limiter, clock)
    }

    #[tokio::test]
    async fn test_hit_rejects_past_cap() {
        let (limiter, _clock) = limiter(5, 60);

        for i in 0..5 {
            assert!(
                limiter.hit("10.0.0.1").await.is_allowed(),
                "request {} should pass",
                i + 1
            );
        }

        match limiter.hit("10.0.0.1").await {
            RateLimitResult::Limited { reason, .. } => {
                assert_eq!(reason, RateLimitReason::ClientRateExceeded);
            }
            RateLimitResult::Allowed { .. } => panic!("Should be limited"),
        }
    }

    #[tokio::test]
    async fn test_hit_counts_rejected_requests() {
        let (limiter, _clock) = limiter(2, 60);

        for _ in 0..4 {
            limiter.hit("client").await;
        }
        assert_eq!(limiter.count("client").await, Some(4));
    }

    #[tokio::test]
    async fn test_hit_resets_after_window() {
        let (limiter, clock) = limiter(2, 60);

        for _ in 0..3 {
            limiter.hit("client").await;
        }
        assert!(!limiter.hit("client").await.is_allowed());

        // Exactly the window length is still inside the window
        clock.advance(Duration::from_secs(60));
        assert!(!limiter.hit("client").await.is_allowed());

        clock.advance(Duration::from_millis(1));
        assert!(limiter.hit("client").await.is_allowed());
        assert_eq!(limiter.count("client").await, Some(1));
    }

    #[tokio::test]
    async fn test_clients_are_independent() {
        let (limiter, _clock) = limiter(1, 60);

        assert!(limiter.hit("a").await.is_allowed());
        assert!(!limiter.hit("a").await.is_allowed());
        assert!(limiter.hit("b").await.is_allowed());
    }

    #[tokio::test]
    async fn test_try_admit_does_not_count_rejections() {
        let (limiter, _clock) = limiter(3, 900);

        for _ in 0..3 {
            assert!(limiter.try_admit("client").await.is_allowed());
        }
        for _ in 0..5 {
            assert!(!limiter.try_admit("client").await.is_allowed());
        }
        assert_eq!(limiter.count("client").await, Some(3));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let (limiter, clock) = limiter(10, 60);

        limiter.hit("old").await;
        clock.advance(Duration::from_secs(30));
        limiter.hit("fresh").await;
        clock.advance(Duration::from_secs(31));

        assert_eq!(limiter.sweep_expired().await, 1);
        assert_eq!(limiter.tracked().await, 1);
        assert_eq!(limiter.count("old").await, None);
        assert_eq!(limiter.count("fresh").await, Some(1));
    }

    #[tokio::test]
    async fn test_global_window() {
        let clock = Arc::new(ManualClock::new());
        let global = GlobalWindow::new(2, Duration::from_secs(60), clock.clone());

        assert!(global.try_admit().await.is_allowed());
        assert!(global.try_admit().await.is_allowed());
        match global.try_admit().await {
            RateLimitResult::Limited { reason, retry_after } => {
                assert_eq!(reason, RateLimitReason::GlobalRateExceeded);
                assert_eq!(retry_after, Duration::from_secs(60));
            }
            RateLimitResult::Allowed { .. } => panic!("Should be limited"),
        }

        clock.advance(Duration::from_secs(61));
        assert!(global.try_admit().await.is_allowed());
    }

    #[test]
    fn test_client_key_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.9.9.9"));
        assert_eq!(client_key(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_key_fallbacks() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers), ANONYMOUS_CLIENT);

        headers.insert("remote-addr", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_key(&headers), "198.51.100.2");

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.3"));
        assert_eq!(client_key(&headers), "198.51.100.3");
    }
}
