//! HTTP routes for Roster
//!
//! This module defines all HTTP endpoints exposed by the service.

pub mod auth;
pub mod health;
pub mod metrics;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    handler::Handler,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    middleware::{
        auth::{auth_middleware, require_admin},
        rate_limiter::rate_limit_middleware,
    },
    AppState,
};

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Middleware is applied in reverse order (last applied runs first),
    // so auth runs before the admin guard
    let protected_routes = Router::new()
        .route(
            "/api/v1/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/api/v1/users/:id",
            get(users::get_user).put(users::update_user).delete(
                users::delete_user
                    .layer(middleware::from_fn_with_state(state.clone(), require_admin)),
            ),
        )
        // Route layer, so unmatched paths fall through to a 404
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public_routes = Router::new()
        .route("/", get(welcome))
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/api/v1/register", post(auth::register))
        .route("/api/v1/login", post(auth::login));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // Every request is rate limited before routing or auth
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.request_timeout_seconds,
        )))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn welcome() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the Roster user API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
