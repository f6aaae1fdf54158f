//! Fixed-window rate limiting keyed by client identity.
//!
//! On each request the identity's window entry is looked up. If it is absent or
//! its window has elapsed (`now - window_start >= window`) it is reset to
//! `count = 1, window_start = now` and the request is admitted. Otherwise the
//! counter is incremented and the request is admitted while `count <= max`.
//!
//! # Known limitation
//! Windows are fixed, not sliding. A client can spend its full budget at the
//! end of one window and again at the start of the next, so up to `2 × max`
//! requests may be admitted in a span shorter than one window. This is the
//! accepted price of O(1) state per identity.
//!
//! Counters live in a [`CounterStore`] handed to the limiter at construction.
//! The default [`MemoryCounterStore`] is process-local; a multi-instance
//! deployment under-enforces the limit unless it plugs in a shared store.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::schema::{RateLimitConfig, DEFAULT_RATE_LIMIT_MESSAGE};
use crate::error::IngressError;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Window length, budget and rejection message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePolicy {
    pub window: Duration,
    pub max_requests: u64,
    pub message: String,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3600),
            max_requests: 5000,
            message: DEFAULT_RATE_LIMIT_MESSAGE.to_string(),
        }
    }
}

impl From<&RateLimitConfig> for RatePolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
            message: config.message.clone(),
        }
    }
}

/// State of one identity's window right after a hit was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub count: u64,
    pub window_start: Instant,
}

/// Storage for per-identity window counters.
///
/// `hit` must be atomic per key: two concurrent hits for the same identity
/// must both be counted.
pub trait CounterStore: Send + Sync {
    /// Record one request for `key` and return the window after the increment,
    /// resetting the window first if it has elapsed.
    fn hit(&self, key: &str, now: Instant, window: Duration) -> WindowSnapshot;

    /// Drop entries whose window has elapsed. Returns how many were removed.
    fn sweep_expired(&self, _now: Instant, _window: Duration) -> usize {
        0
    }

    /// Number of identities currently tracked.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u64,
    window_start: Instant,
}

/// In-process counter store.
///
/// `DashMap::entry` holds the shard's write lock while the entry is updated,
/// which makes the increment-and-compare atomic per key.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: DashMap<String, WindowEntry>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounterStore {
    fn hit(&self, key: &str, now: Instant, window: Duration) -> WindowSnapshot {
        let mut entry = self.entries.entry(key.to_owned()).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        if entry.count == 0 || now.saturating_duration_since(entry.window_start) >= window {
            entry.count = 1;
            entry.window_start = now;
        } else {
            entry.count = entry.count.saturating_add(1);
        }

        WindowSnapshot {
            count: entry.count,
            window_start: entry.window_start,
        }
    }

    fn sweep_expired(&self, now: Instant, window: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.window_start) < window);
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Budget information reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u64,
    pub remaining: u64,
    /// Time until the current window ends.
    pub reset_after: Duration,
}

impl Quota {
    /// Whole seconds until reset, rounded up and never zero.
    pub fn reset_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        let secs = if self.reset_after.subsec_nanos() > 0 { secs + 1 } else { secs };
        secs.max(1)
    }

    /// Set the standard `RateLimit-*` headers.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(self.reset_secs()));
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Admit(Quota),
    Reject(Quota),
}

impl RateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateDecision::Admit(_))
    }

    pub fn quota(&self) -> Quota {
        match self {
            RateDecision::Admit(q) | RateDecision::Reject(q) => *q,
        }
    }
}

/// Fixed-window limiter over a pluggable counter store.
pub struct FixedWindowLimiter {
    policy: RatePolicy,
    store: Arc<dyn CounterStore>,
}

impl FixedWindowLimiter {
    pub fn new(policy: RatePolicy, store: Arc<dyn CounterStore>) -> Self {
        Self { policy, store }
    }

    /// Limiter backed by a fresh [`MemoryCounterStore`].
    pub fn in_memory(policy: RatePolicy) -> Self {
        Self::new(policy, Arc::new(MemoryCounterStore::new()))
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    pub fn check(&self, identity: &str) -> RateDecision {
        self.check_at(identity, Instant::now())
    }

    pub fn check_at(&self, identity: &str, now: Instant) -> RateDecision {
        let window = self.policy.window;
        let max = self.policy.max_requests;
        let snapshot = self.store.hit(identity, now, window);
        let elapsed = now.saturating_duration_since(snapshot.window_start);
        let reset_after = window.saturating_sub(elapsed);

        if snapshot.count <= max {
            RateDecision::Admit(Quota {
                limit: max,
                remaining: max - snapshot.count,
                reset_after,
            })
        } else {
            RateDecision::Reject(Quota {
                limit: max,
                remaining: 0,
                reset_after,
            })
        }
    }

    /// The client-visible error for a rejected quota.
    pub fn rejection(&self, quota: &Quota) -> IngressError {
        IngressError::RateLimitExceeded {
            message: self.policy.message.clone(),
            retry_after_secs: quota.reset_secs(),
        }
    }

    /// Periodically evict elapsed windows until shutdown.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.store.sweep_expired(Instant::now(), self.policy.window);
                        if removed > 0 {
                            tracing::debug!(
                                removed,
                                tracked = self.store.len(),
                                "Evicted elapsed rate windows"
                            );
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate window sweeper exiting");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u64, window_secs: u64) -> FixedWindowLimiter {
        FixedWindowLimiter::in_memory(RatePolicy {
            window: Duration::from_secs(window_secs),
            max_requests: max,
            message: "Too many requests, please try again later.".into(),
        })
    }

    #[test]
    fn max_is_admitted_and_next_is_rejected() {
        let limiter = limiter(5, 60);
        let now = Instant::now();
        for i in 1..=5 {
            let decision = limiter.check_at("1.2.3.4", now);
            assert!(decision.is_admitted(), "request {i} should be admitted");
            assert_eq!(decision.quota().remaining, 5 - i);
        }
        let decision = limiter.check_at("1.2.3.4", now);
        assert!(!decision.is_admitted());
        assert_eq!(decision.quota().remaining, 0);
    }

    #[test]
    fn window_elapse_resets_counter() {
        let limiter = limiter(2, 60);
        let start = Instant::now();
        limiter.check_at("client", start);
        limiter.check_at("client", start);
        assert!(!limiter.check_at("client", start + Duration::from_secs(59)).is_admitted());

        let decision = limiter.check_at("client", start + Duration::from_secs(60));
        assert!(decision.is_admitted());
        assert_eq!(decision.quota().remaining, 1);
    }

    #[test]
    fn identities_are_independent() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(limiter.check_at("a", now).is_admitted());
        assert!(!limiter.check_at("a", now).is_admitted());
        assert!(limiter.check_at("b", now).is_admitted());
    }

    #[test]
    fn boundary_admits_up_to_twice_max() {
        // Documented fixed-window trade-off: a burst straddling the boundary.
        let limiter = limiter(3, 60);
        let start = Instant::now();
        limiter.check_at("c", start);
        let late = start + Duration::from_secs(59);
        let early_next = start + Duration::from_secs(60);

        let mut admitted = 0;
        for _ in 0..3 {
            // The first hit opened the window, two more fit before the boundary.
            if limiter.check_at("c", late).is_admitted() {
                admitted += 1;
            }
        }
        for _ in 0..3 {
            if limiter.check_at("c", early_next).is_admitted() {
                admitted += 1;
            }
        }
        assert_eq!(admitted + 1, 6);
    }

    #[test]
    fn concurrent_hits_are_not_lost() {
        let store = Arc::new(MemoryCounterStore::new());
        let window = Duration::from_secs(3600);
        let now = Instant::now();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for _ in 0..500 {
                        store.hit("shared", now, window);
                    }
                });
            }
        });

        assert_eq!(store.hit("shared", now, window).count, 4001);
    }

    #[test]
    fn rejection_uses_configured_message() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        limiter.check_at("x", now);
        let quota = limiter.check_at("x", now + Duration::from_millis(500)).quota();
        match limiter.rejection(&quota) {
            IngressError::RateLimitExceeded {
                message,
                retry_after_secs,
            } => {
                assert_eq!(message, "Too many requests, please try again later.");
                assert_eq!(retry_after_secs, 60);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn sweep_drops_elapsed_windows() {
        let store = MemoryCounterStore::new();
        let window = Duration::from_secs(10);
        let start = Instant::now();
        store.hit("old", start, window);
        store.hit("fresh", start + Duration::from_secs(8), window);

        let removed = store.sweep_expired(start + Duration::from_secs(12), window);
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn quota_headers() {
        let quota = Quota {
            limit: 5000,
            remaining: 4999,
            reset_after: Duration::from_millis(3_599_500),
        };
        let mut headers = HeaderMap::new();
        quota.apply(&mut headers);
        assert_eq!(headers[RATELIMIT_LIMIT], "5000");
        assert_eq!(headers[RATELIMIT_REMAINING], "4999");
        assert_eq!(headers[RATELIMIT_RESET], "3600");
    }
}
