use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::{Duration, Instant};

use flowgate_core::error::BoxError;
use flowgate_core::throttle::ThrottleBackend;

#[derive(Debug)]
struct Window {
    count: u64,
    started: Instant,
    length: Duration,
}

impl Window {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.length
    }
}

/// Calls to `increment` between two sweeps of expired windows.
pub const DEFAULT_PURGE_INTERVAL: u64 = 1024;

/// Fixed-window counters keyed by string. Single process only.
///
/// Each key's read-modify-write happens under its `DashMap` shard lock, so
/// concurrent increments on one key never lose counts. Expired windows are
/// swept every `purge_interval` increments, keeping the map bounded by the
/// keys seen within one window.
#[derive(Debug)]
pub struct InMemoryThrottleBackend {
    counters: DashMap<String, Window>,
    calls: AtomicU64,
    purge_interval: u64,
}

impl Default for InMemoryThrottleBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryThrottleBackend {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            calls: AtomicU64::new(0),
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }

    /// Sweep expired windows every `interval` increments (minimum 1).
    pub fn with_purge_interval(mut self, interval: u64) -> Self {
        self.purge_interval = interval.max(1);
        self
    }

    /// Number of tracked keys (expired windows included until purged).
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drop every key whose window has elapsed. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, w| !w.expired(now));
        before.saturating_sub(self.counters.len())
    }
}

#[async_trait]
impl ThrottleBackend for InMemoryThrottleBackend {
    async fn increment(&self, key: &str, window_seconds: u64) -> Result<(u64, u64), BoxError> {
        let window_seconds = window_seconds.max(1);
        let length = Duration::from_secs(window_seconds);

        // sweep before taking the entry lock; retain needs every shard
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if calls % self.purge_interval == 0 {
            let purged = self.purge_expired();
            if purged > 0 {
                tracing::trace!(
                    purged,
                    remaining = self.counters.len(),
                    "expired throttle windows purged"
                );
            }
        }

        let now = Instant::now();
        let mut w = self.counters.entry(key.to_string()).or_insert_with(|| Window {
            count: 0,
            started: now,
            length,
        });

        if w.count == 0 || w.expired(now) {
            w.count = 1;
            w.started = now;
            w.length = length;
            return Ok((1, window_seconds));
        }

        w.count += 1;
        let remaining = w.length.saturating_sub(now.duration_since(w.started));
        let ttl = (remaining.as_secs_f64().ceil() as u64).max(1);
        Ok((w.count, ttl))
    }

    async fn reset(&self, key: &str) -> Result<(), BoxError> {
        self.counters.remove(key);
        Ok(())
    }
}
