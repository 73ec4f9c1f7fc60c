use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy)]
pub struct WindowState {
    started: Instant,
    count: u32,
}

/// Shared window table. Injected so several limiters (or tests) can own it.
pub type RateLimitStore = Arc<DashMap<String, WindowState>>;

/// Every this many checks, elapsed windows of other clients are dropped.
const PURGE_EVERY: u64 = 256;

/// Fixed-window limiter for mutating requests, keyed by client.
///
/// A client's window expires on its next access; windows of clients that
/// never come back are purged opportunistically from `check`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    windows: RateLimitStore,
    checks: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self::with_store(window, max_requests, Arc::new(DashMap::new()))
    }

    pub fn with_store(window: Duration, max_requests: u32, windows: RateLimitStore) -> Self {
        Self {
            window,
            max_requests,
            windows,
            checks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Option<Self> {
        cfg.enabled
            .then(|| Self::new(Duration::from_secs(cfg.window_secs), cfg.max_requests))
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        // Purge before taking the entry guard: `retain` locks every shard.
        if self.checks.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            let purged = self.purge_expired_at(now);
            if purged > 0 {
                tracing::trace!(purged, "rate limit windows purged");
            }
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert(WindowState {
            started: now,
            count: 0,
        });
        // Expired windows restart on access.
        if now.duration_since(entry.started) >= self.window {
            *entry = WindowState {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let elapsed = now.duration_since(entry.started);
            let left = self.window.saturating_sub(elapsed);
            // Round up so clients never retry early.
            let retry_after_secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
            return RateDecision::Limited {
                retry_after_secs: retry_after_secs.max(1),
            };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }

    /// Drop windows that have fully elapsed; returns how many were removed.
    fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, state| now.duration_since(state.started) < self.window);
        before.saturating_sub(self.windows.len())
    }
}
