//! Throttle backend contract.
//!
//! The only state shared across concurrent executions. Implementations must
//! make `increment` atomic per key: a split read-then-write undercounts under
//! concurrency. Networked backends satisfy this with the store's own atomic
//! increment.

use async_trait::async_trait;

use crate::error::BoxError;

/// Pluggable storage for rate-limit counters.
#[async_trait]
pub trait ThrottleBackend: Send + Sync {
    /// Count one hit for `key` within a fixed window of `window_seconds`.
    ///
    /// Returns `(count_in_window, seconds_until_window_resets)`.
    async fn increment(&self, key: &str, window_seconds: u64) -> Result<(u64, u64), BoxError>;

    /// Forget the counter for `key`.
    async fn reset(&self, key: &str) -> Result<(), BoxError>;
}
