//! Per-client sliding-window rate limiting
//!
//! The limiter owns the policy (how many requests per how long) and
//! delegates the bookkeeping to a [`WindowStore`], so a single-instance
//! deployment can keep windows in memory while a multi-instance one can
//! plug in a shared cache.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::RateLimitConfig;

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request recorded; `remaining` more fit in the current window
    Admitted { remaining: usize },
    /// Window full; the oldest entry expires after `retry_after`
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Storage for per-client request timestamps.
///
/// `check_and_record` must prune, count and append as one atomic step for a
/// given key; two concurrent calls may never both take the last slot.
#[async_trait]
pub trait WindowStore: Send + Sync {
    async fn check_and_record(
        &self,
        client_id: &str,
        now: Instant,
        window: Duration,
        limit: usize,
    ) -> Admission;
}

/// Checks between sweeps of idle clients
const SWEEP_INTERVAL: u64 = 1024;

/// In-process store backed by a sharded concurrent map.
///
/// Timestamps are evicted lazily on the next check for the same client.
/// Every [`SWEEP_INTERVAL`] checks, clients with nothing left in their
/// window are dropped from the map.
#[derive(Debug, Default)]
pub struct InMemoryWindowStore {
    windows: DashMap<String, VecDeque<Instant>>,
    checks: AtomicU64,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamps currently held for a client (expired ones included until
    /// the next check prunes them)
    pub fn recorded(&self, client_id: &str) -> usize {
        self.windows.get(client_id).map(|w| w.len()).unwrap_or(0)
    }

    /// Number of clients with an entry in the map
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    fn sweep(&self, now: Instant, window: Duration) {
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|&newest| now.saturating_duration_since(newest) < window)
        });
        tracing::debug!(
            "Rate limit sweep dropped {} idle clients",
            before.saturating_sub(self.windows.len())
        );
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn check_and_record(
        &self,
        client_id: &str,
        now: Instant,
        window: Duration,
        limit: usize,
    ) -> Admission {
        // Must run before the entry guard below is taken
        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.sweep(now, window);
        }

        // The entry guard holds the shard lock for the whole check
        let mut timestamps = self.windows.entry(client_id.to_string()).or_default();

        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= limit {
            let retry_after = timestamps
                .front()
                .map(|&oldest| window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(window);
            return Admission::Rejected { retry_after };
        }

        timestamps.push_back(now);
        Admission::Admitted {
            remaining: limit - timestamps.len(),
        }
    }
}

/// Sliding window of `max_requests` per `window` per client
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn WindowStore>) -> Self {
        Self {
            store,
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
        }
    }

    /// Limiter over a fresh in-memory store
    pub fn in_memory(config: &RateLimitConfig) -> Self {
        Self::new(config, Arc::new(InMemoryWindowStore::new()))
    }

    pub async fn admit(&self, client_id: &str) -> Admission {
        self.admit_at(client_id, Instant::now()).await
    }

    pub async fn admit_at(&self, client_id: &str, now: Instant) -> Admission {
        let admission = self
            .store
            .check_and_record(client_id, now, self.window, self.max_requests)
            .await;
        if let Admission::Rejected { retry_after } = admission {
            tracing::debug!("Rate limited client {client_id}, retry after {retry_after:?}");
        }
        admission
    }
}
