//! Configuration management for Roster
//!
//! Configuration is loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

use crate::middleware::rate_limiter::RateLimitConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Postgres connection URL
    pub database_url: String,
    /// Maximum pooled database connections
    pub database_max_connections: u32,

    /// Whether the Redis counter store should be used at all
    pub redis_enabled: bool,
    /// Redis connection URL
    pub redis_url: String,
    /// Deadline applied to every counter store call (in milliseconds)
    pub cache_op_timeout_ms: u64,

    /// TTL for cached user records (in seconds)
    pub user_cache_ttl_seconds: u64,

    /// Rate limiter settings
    pub rate_limit: RateLimitConfig,

    /// HS256 secret for signing tokens
    pub jwt_secret: String,
    /// Token lifetime in days
    pub jwt_expiration_days: i64,

    /// Deadline for an entire HTTP request (in seconds)
    pub request_timeout_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let window_seconds: u64 = positive_or_default("RATE_LIMIT_WINDOW_SECONDS", 60);

        Ok(Self {
            host: env::var("ROSTER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,

            redis_enabled: env::var("REDIS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            cache_op_timeout_ms: env::var("CACHE_OP_TIMEOUT_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .context("Invalid CACHE_OP_TIMEOUT_MS")?,

            user_cache_ttl_seconds: env::var("USER_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .context("Invalid USER_CACHE_TTL_SECONDS")?,

            rate_limit: RateLimitConfig {
                requests_per_minute: positive_or_default("RATE_LIMIT_REQUESTS_PER_MINUTE", 60),
                burst_size: positive_or_default("RATE_LIMIT_BURST_SIZE", 10),
                window: Duration::from_secs(window_seconds),
                ..RateLimitConfig::default()
            },

            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_expiration_days: positive_or_default("JWT_EXPIRATION_DAYS", 60),

            request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid REQUEST_TIMEOUT_SECONDS")?,
        })
    }

    /// User cache TTL as a duration
    pub fn user_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.user_cache_ttl_seconds)
    }

    /// Counter store deadline as a duration
    pub fn cache_op_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_op_timeout_ms)
    }
}

/// Parse a strictly positive number, warning and falling back on bad input
fn positive_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let Ok(raw) = env::var(name) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!(variable = name, value = %raw, default = %default, "Invalid value, using default");
            default
        }
    }
}
