//! Fixed-window rate limiting keyed by (subject, operation).
//!
//! The store is behind a trait so a shared backend (e.g. Redis) can replace
//! the in-process map without touching the handlers.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-operation limits. Heartbeats are expected every ~30s, so 4 per minute
/// leaves headroom for one retry; config pulls are cheap reads.
pub mod policies {
    use super::RateLimitPolicy;
    use std::time::Duration;

    pub const HEARTBEAT: RateLimitPolicy = RateLimitPolicy {
        operation: "heartbeat",
        max_calls: 4,
        window: Duration::from_secs(60),
    };

    pub const CONFIG_PULL: RateLimitPolicy = RateLimitPolicy {
        operation: "config_pull",
        max_calls: 60,
        window: Duration::from_secs(60),
    };
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub operation: &'static str,
    pub max_calls: u32,
    pub window: Duration,
}

/// Counting backend for the limiter. `hit` records one call against the key
/// and reports whether it was admitted.
pub trait RateLimitStore: Send + Sync {
    fn hit(&self, key: &str, max_calls: u32, window: Duration) -> bool;
}

struct Window {
    count: u32,
    resets_at: Instant,
}

/// Default store: one counter per key, reset lazily when its window elapses.
pub struct InMemoryRateLimitStore {
    windows: DashMap<String, Window>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn hit(&self, key: &str, max_calls: u32, window: Duration) -> bool {
        let now = Instant::now();

        // The entry guard holds the shard lock, so check-and-increment is
        // atomic per key.
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window {
                count: 0,
                resets_at: now + window,
            });

        if now >= entry.resets_at {
            entry.count = 0;
            entry.resets_at = now + window;
        }

        if entry.count >= max_calls {
            return false;
        }

        entry.count += 1;
        true
    }
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()))
    }

    /// Check one call by `subject` against the operation's policy.
    pub fn allow(&self, subject: &str, policy: &RateLimitPolicy) -> bool {
        let key = format!("{}:{}", subject, policy.operation);
        let admitted = self.store.hit(&key, policy.max_calls, policy.window);
        if !admitted {
            log::warn!(
                "[RATELIMIT] {} denied for {} ({} calls / {:?})",
                policy.operation,
                subject,
                policy.max_calls,
                policy.window
            );
        }
        admitted
    }
}
