//! Rate limiting integration tests
//!
//! - In-memory token bucket when no live backend is configured
//! - Fixed-window counter shared across instances on a live backend
//! - 429 responses with Retry-After and X-RateLimit-Limit headers
//! - Fail-open when the backend errors mid-flight

use std::sync::Arc;

use axum::http::StatusCode;
use roster::middleware::rate_limiter::{RateLimitConfig, RateLimiter, Strategy};
use roster::{CounterStore, InMemoryStore, NullStore};
use serde_json::Value;

use crate::common::{from_ip, test_config, TestApp};
use crate::mocks::{FlakyStore, TestRedis};

fn limited_config() -> roster::Config {
    let mut config = test_config();
    config.rate_limit = RateLimitConfig::default();
    config
}

#[tokio::test]
async fn test_in_memory_burst_then_429() {
    let app = TestApp::with(limited_config(), Arc::new(NullStore::new()));

    let mut allowed = 0;
    let mut last = None;
    for _ in 0..15 {
        let response = from_ip(app.server.get("/"), "203.0.113.10").await;
        if response.status_code() == StatusCode::OK {
            allowed += 1;
        } else {
            last = Some(response);
        }
    }

    // Ten from the burst, and at most one earned while the loop ran
    assert!((10..=11).contains(&allowed), "allowed {allowed}");
    let denied = last.expect("some requests should be denied");
    denied.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(denied.header("retry-after"), "1");
    assert_eq!(denied.header("x-ratelimit-limit"), "60");

    let json: Value = denied.json();
    assert_eq!(json["error"]["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(
        json["error"]["message"],
        "Rate limit exceeded. Please try again later."
    );
}

#[tokio::test]
async fn test_clients_are_limited_independently() {
    let app = TestApp::with(limited_config(), Arc::new(NullStore::new()));

    for _ in 0..12 {
        from_ip(app.server.get("/"), "203.0.113.1").await;
    }
    from_ip(app.server.get("/"), "203.0.113.1")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
    from_ip(app.server.get("/"), "203.0.113.2")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_limiter_runs_before_auth() {
    let app = TestApp::with(limited_config(), Arc::new(NullStore::new()));

    for _ in 0..12 {
        from_ip(app.server.get("/api/v1/users"), "203.0.113.3").await;
    }
    // Throttled rather than unauthorized
    from_ip(app.server.get("/api/v1/users"), "203.0.113.3")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_distributed_window_is_shared_between_instances() {
    let store: Arc<dyn CounterStore> = Arc::new(InMemoryStore::new());
    let first = TestApp::with(limited_config(), Arc::clone(&store));
    let second = TestApp::with(limited_config(), Arc::clone(&store));

    for i in 0..60 {
        let app = if i % 2 == 0 { &first } else { &second };
        from_ip(app.server.get("/"), "198.51.100.7")
            .await
            .assert_status_ok();
    }

    let denied = from_ip(second.server.get("/"), "198.51.100.7").await;
    denied.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(denied.header("retry-after"), "60");
}

#[tokio::test]
async fn test_backend_failure_fails_open() {
    let store = Arc::new(FlakyStore::new());
    let app = TestApp::with(limited_config(), store.clone());

    // Select the distributed strategy while the backend is healthy
    from_ip(app.server.get("/"), "198.51.100.8")
        .await
        .assert_status_ok();
    assert!(matches!(
        app.state.rate_limiter.strategy().await,
        Strategy::Distributed(_)
    ));

    store.set_failing(true);
    for _ in 0..100 {
        from_ip(app.server.get("/"), "198.51.100.8")
            .await
            .assert_status_ok();
    }
}

#[tokio::test]
async fn test_strategy_is_selected_once() {
    let store = Arc::new(FlakyStore::new());
    store.set_failing(true);
    let limiter = RateLimiter::new(RateLimitConfig::default(), store.clone());
    assert!(matches!(limiter.strategy().await, Strategy::InMemory(_)));

    // A backend that recovers later does not switch strategies
    store.set_failing(false);
    assert!(matches!(limiter.strategy().await, Strategy::InMemory(_)));
}

#[tokio::test]
async fn test_two_limiters_share_a_redis_window() {
    let Some(redis) = TestRedis::connect().await else {
        eprintln!("Skipping test: Redis not available");
        return;
    };
    let store: Arc<dyn CounterStore> = Arc::new(redis.store.clone());
    let a = RateLimiter::new(RateLimitConfig::default(), Arc::clone(&store));
    let b = RateLimiter::new(RateLimitConfig::default(), Arc::clone(&store));
    let client = redis.client("shared");

    assert!(matches!(a.strategy().await, Strategy::Distributed(_)));
    for i in 0..60 {
        let limiter = if i % 2 == 0 { &a } else { &b };
        assert!(limiter.allow(&client).await, "request {i} denied");
    }
    assert!(!a.allow(&client).await);
    assert!(!b.allow(&client).await);

    if let Strategy::Distributed(limiter) = a.strategy().await {
        limiter.reset(&client).await.unwrap();
    }
}
