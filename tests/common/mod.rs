//! Common test utilities for Roster
//!
//! Builds the real router on in-memory collaborators and offers helpers
//! for the flows most tests start with.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use roster::middleware::rate_limiter::RateLimitConfig;
use roster::{routes, AppState, Config, CounterStore, InMemoryStore};
use serde_json::{json, Value};

use crate::mocks::CountingRepository;

/// Test configuration constants
pub mod constants {
    pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
    pub const TEST_PASSWORD: &str = "Str0ng!pass";
}

/// Config with limits high enough that ordinary tests never hit them
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        redis_enabled: false,
        redis_url: crate::mocks::TEST_REDIS_URL.to_string(),
        cache_op_timeout_ms: 500,
        user_cache_ttl_seconds: 900,
        rate_limit: RateLimitConfig {
            requests_per_minute: 100_000,
            burst_size: 100_000,
            ..RateLimitConfig::default()
        },
        jwt_secret: constants::TEST_JWT_SECRET.to_string(),
        jwt_expiration_days: 1,
        request_timeout_seconds: 30,
    }
}

/// A running router plus handles on its collaborators
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub repo: Arc<CountingRepository>,
    pub store: Arc<dyn CounterStore>,
}

impl TestApp {
    /// Router on an in-memory repository and counter store
    pub fn new() -> Self {
        Self::with(test_config(), Arc::new(InMemoryStore::new()))
    }

    pub fn with(config: Config, store: Arc<dyn CounterStore>) -> Self {
        let repo = Arc::new(CountingRepository::new());
        let state = Arc::new(AppState::from_parts(
            config,
            repo.clone(),
            Arc::clone(&store),
        ));
        let server = TestServer::new(routes::create_router(state.clone()))
            .expect("Failed to create test server");
        Self {
            server,
            state,
            repo,
            store,
        }
    }

    /// Register an account and return `(user id, jwt)`
    pub async fn register(&self, email: &str, role: Option<&str>) -> (i64, String) {
        let mut body = json!({
            "first_name": "Test",
            "last_name": "User",
            "email": email,
            "password": constants::TEST_PASSWORD,
        });
        if let Some(role) = role {
            body["role"] = json!(role);
        }

        let response = self.server.post("/api/v1/register").json(&body).await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let json: Value = response.json();
        (
            json["user"]["id"].as_i64().expect("user id"),
            json["token"]["jwt_token"]
                .as_str()
                .expect("jwt token")
                .to_string(),
        )
    }
}

/// Attach a bearer token to a request
pub fn bearer(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("valid header"),
    )
}

/// Pretend the request came through a proxy from `ip`
pub fn from_ip(request: TestRequest, ip: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_str(ip).expect("valid header"),
    )
}
