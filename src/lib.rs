//! Roster - user management API with a two-tier cache and rate limiter
//!
//! This library provides the core functionality for the Roster server:
//! JWT-authenticated user CRUD over Postgres, a dual-keyed user cache
//! on an optional Redis backend, and per-client rate limiting that works
//! in-process or across instances.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod users;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

pub use crate::auth::{AuthService, JwtKeys};
pub use crate::cache::{CounterStore, InMemoryStore, NullStore, RedisStore, UserCache};
pub use crate::config::Config;
pub use crate::middleware::rate_limiter::RateLimiter;
pub use crate::users::{InMemoryUserRepository, PgUserRepository, UserRepository, UserService};

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    /// Counter store shared by the user cache and the rate limiter
    pub store: Arc<dyn CounterStore>,
    pub users: UserService,
    pub auth: AuthService,
    pub rate_limiter: Arc<RateLimiter>,
    pub start_time: Instant,
}

impl AppState {
    /// Connect to Postgres and, when enabled, Redis.
    ///
    /// A Redis connection failure is not fatal: the null store is installed
    /// and the service runs without a shared cache.
    pub async fn new(config: Config) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run database migrations")?;

        let store = connect_store(&config).await;
        let repo: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(db));

        Ok(Self::from_parts(config, repo, store))
    }

    /// Assemble state from already-built parts
    pub fn from_parts(
        config: Config,
        repo: Arc<dyn UserRepository>,
        store: Arc<dyn CounterStore>,
    ) -> Self {
        let users = UserService::new(
            repo,
            UserCache::new(Arc::clone(&store)),
            config.user_cache_ttl(),
        );
        let auth = AuthService::new(
            users.clone(),
            JwtKeys::new(&config.jwt_secret, config.jwt_expiration_days),
        );
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.clone(),
            Arc::clone(&store),
        ));

        Self {
            config,
            store,
            users,
            auth,
            rate_limiter,
            start_time: Instant::now(),
        }
    }
}

async fn connect_store(config: &Config) -> Arc<dyn CounterStore> {
    if !config.redis_enabled {
        info!("Redis disabled; using null counter store");
        return Arc::new(NullStore::new());
    }

    match RedisStore::connect(&config.redis_url, config.cache_op_timeout()).await {
        Ok(store) => {
            info!("Connected to Redis counter store");
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable; continuing without a shared cache");
            Arc::new(NullStore::new())
        }
    }
}
