//! Rate limiting unit.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use flowgate_core::error::{Abort, UnitError};
use flowgate_core::{Category, Descriptor, PolicyUnit, RequestContext, ThrottleBackend};

use super::{key_fn, KeyFn};
use crate::throttle::InMemoryThrottleBackend;

/// Default key: authenticated principal, else client address, else the first
/// `X-Forwarded-For` hop, else a shared `ip:unknown` bucket.
pub fn default_rate_limit_key(ctx: &RequestContext) -> String {
    if let Some(p) = ctx.principal() {
        return match p.get("sub").and_then(|s| s.as_str()) {
            Some(sub) => format!("user:{sub}"),
            None => format!("user:{p}"),
        };
    }
    let req = ctx.request();
    if let Some(client) = req.client() {
        return format!("ip:{client}");
    }
    if let Some(first) = req
        .header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return format!("ip:{first}");
    }
    "ip:unknown".to_string()
}

/// Allows `rate` hits per `window_seconds` per key; the next one is throttled.
pub struct RateLimit {
    rate: u64,
    window_seconds: u64,
    key: KeyFn,
    backend: Arc<dyn ThrottleBackend>,
}

impl RateLimit {
    /// Limiter with the default key and a private in-memory backend.
    pub fn new(rate: u64, window_seconds: u64) -> Self {
        Self {
            rate,
            window_seconds,
            key: key_fn(default_rate_limit_key),
            backend: Arc::new(InMemoryThrottleBackend::new()),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn ThrottleBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_key<F>(self, f: F) -> Self
    where
        F: Fn(&RequestContext) -> String + Send + Sync + 'static,
    {
        self.with_shared_key(key_fn(f))
    }

    pub fn with_shared_key(mut self, key: KeyFn) -> Self {
        self.key = key;
        self
    }

    pub fn rate(&self) -> u64 {
        self.rate
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }
}

#[async_trait]
impl PolicyUnit for RateLimit {
    fn category(&self) -> Category {
        Category::Throttling
    }

    fn name(&self) -> &str {
        "RateLimit"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<(), UnitError> {
        let key = (self.key)(&*ctx);
        let (count, ttl) = self
            .backend
            .increment(&key, self.window_seconds)
            .await
            .map_err(UnitError::Failure)?;
        if count > self.rate {
            tracing::debug!(%key, count, rate = self.rate, retry_after = ttl, "rate limited");
            return Err(Abort::throttled(Some(ttl)).into());
        }
        Ok(())
    }

    fn describe(&self) -> Option<Descriptor> {
        Some(Descriptor::new().with_response(
            429,
            json!({
                "description": "Rate limit exceeded",
                "headers": {
                    "Retry-After": {
                        "description": "Seconds until rate limit resets",
                        "schema": { "type": "integer" },
                    }
                },
            }),
        ))
    }
}
