#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use flowgate_core::{Abort, InboundRequest, PolicyUnit, RequestContext, ThrottleBackend, UnitError};
use flowgate_engine::units::{default_rate_limit_key, RateLimit};
use flowgate_engine::InMemoryThrottleBackend;

fn from(client: &str) -> RequestContext {
    RequestContext::new(InboundRequest::new("GET", "/").with_client(client))
}

fn throttled(r: Result<(), UnitError>) -> Abort {
    match r {
        Err(UnitError::Abort(a)) => a,
        other => panic!("expected throttle, got {other:?}"),
    }
}

#[tokio::test]
async fn counts_within_a_window() {
    let backend = InMemoryThrottleBackend::new();
    assert_eq!(backend.increment("k", 60).await.unwrap(), (1, 60));
    let (count, ttl) = backend.increment("k", 60).await.unwrap();
    assert_eq!(count, 2);
    assert!((1..=60).contains(&ttl));

    // keys are independent
    assert_eq!(backend.increment("other", 60).await.unwrap().0, 1);
    assert_eq!(backend.len(), 2);
}

#[tokio::test]
async fn reset_starts_over() {
    let backend = InMemoryThrottleBackend::new();
    for _ in 0..5 {
        backend.increment("k", 60).await.unwrap();
    }
    backend.reset("k").await.unwrap();
    assert_eq!(backend.increment("k", 60).await.unwrap().0, 1);

    // resetting an unknown key is fine
    backend.reset("nope").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn window_expiry_restarts_the_count() {
    let backend = InMemoryThrottleBackend::new();
    backend.increment("k", 10).await.unwrap();
    backend.increment("k", 10).await.unwrap();

    tokio::time::advance(Duration::from_secs(4)).await;
    let (count, ttl) = backend.increment("k", 10).await.unwrap();
    assert_eq!(count, 3);
    assert_eq!(ttl, 6);

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(backend.increment("k", 10).await.unwrap(), (1, 10));
}

#[tokio::test(start_paused = true)]
async fn purge_drops_only_expired_windows() {
    let backend = InMemoryThrottleBackend::new();
    backend.increment("short", 1).await.unwrap();
    backend.increment("long", 60).await.unwrap();

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(backend.purge_expired(), 1);
    assert_eq!(backend.len(), 1);
    assert_eq!(backend.increment("long", 60).await.unwrap().0, 2);
}

#[tokio::test(start_paused = true)]
async fn increments_sweep_expired_windows_on_their_own() {
    let backend = InMemoryThrottleBackend::new().with_purge_interval(4);
    for client in ["a", "b", "c"] {
        backend.increment(client, 1).await.unwrap();
    }
    assert_eq!(backend.len(), 3);

    tokio::time::advance(Duration::from_secs(2)).await;
    // fourth call sweeps the three stale windows before counting
    assert_eq!(backend.increment("d", 1).await.unwrap(), (1, 1));
    assert_eq!(backend.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn sweeping_keeps_live_windows() {
    let backend = InMemoryThrottleBackend::new().with_purge_interval(2);
    backend.increment("live", 60).await.unwrap();
    backend.increment("stale", 1).await.unwrap();

    tokio::time::advance(Duration::from_secs(2)).await;
    backend.increment("live", 60).await.unwrap();
    let (count, _) = backend.increment("live", 60).await.unwrap();
    assert_eq!(count, 3);
    assert_eq!(backend.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_not_lost() {
    let backend = Arc::new(InMemoryThrottleBackend::new());
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let backend = Arc::clone(&backend);
        tasks.push(tokio::spawn(async move {
            for _ in 0..50 {
                backend.increment("shared", 60).await.unwrap();
            }
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }
    assert_eq!(backend.increment("shared", 60).await.unwrap().0, 401);
}

#[tokio::test]
async fn rate_limit_allows_rate_then_throttles() {
    let unit = RateLimit::new(3, 60);
    for _ in 0..3 {
        unit.check(&mut from("10.0.0.1")).await.unwrap();
    }

    let abort = throttled(unit.check(&mut from("10.0.0.1")).await);
    assert_eq!(abort.status(), 429);
    assert_eq!(abort.detail(), "Rate limit exceeded");
    assert!(abort.retry_after().unwrap() > 0);

    // a different client has its own bucket
    unit.check(&mut from("10.0.0.2")).await.unwrap();
}

#[tokio::test]
async fn rate_limit_shares_an_external_backend() {
    let backend = Arc::new(InMemoryThrottleBackend::new());
    let a = RateLimit::new(2, 60).with_backend(backend.clone());
    let b = RateLimit::new(2, 60).with_backend(backend.clone());

    a.check(&mut from("1.1.1.1")).await.unwrap();
    b.check(&mut from("1.1.1.1")).await.unwrap();
    throttled(a.check(&mut from("1.1.1.1")).await);

    backend.reset("ip:1.1.1.1").await.unwrap();
    b.check(&mut from("1.1.1.1")).await.unwrap();
}

#[tokio::test]
async fn custom_key_function() {
    let unit = RateLimit::new(1, 60).with_key(|_ctx: &RequestContext| "global".to_string());
    unit.check(&mut from("1.1.1.1")).await.unwrap();
    throttled(unit.check(&mut from("2.2.2.2")).await);
}

#[test]
fn default_key_prefers_principal_then_client_then_forwarded() {
    let mut ctx = from("10.0.0.9");
    assert_eq!(default_rate_limit_key(&ctx), "ip:10.0.0.9");

    ctx.set_principal(json!({ "sub": "u42" }));
    assert_eq!(default_rate_limit_key(&ctx), "user:u42");

    let forwarded = RequestContext::new(
        InboundRequest::new("GET", "/").with_header("X-Forwarded-For", " 203.0.113.7 , 10.0.0.1"),
    );
    assert_eq!(default_rate_limit_key(&forwarded), "ip:203.0.113.7");

    let unknown = RequestContext::new(InboundRequest::new("GET", "/"));
    assert_eq!(default_rate_limit_key(&unknown), "ip:unknown");
}

#[test]
fn rate_limit_documents_retry_after() {
    let d = RateLimit::new(10, 60).describe().unwrap();
    let resp = &d.responses[&429];
    assert!(resp["headers"].get("Retry-After").is_some());
}
