//! Cache module
//!
//! The [`CounterStore`] capability is the single seam between Roster and its
//! optional key-value backend. Three implementations conform to it:
//!
//! - [`RedisStore`]: shared, network-backed (production)
//! - [`NullStore`]: always-miss, always-succeed (backend disabled or down)
//! - [`InMemoryStore`]: process-local TTL map (tests, single-node stand-in)
//!
//! [`UserCache`] builds the dual-keyed user cache on top of it.

pub mod in_memory;
pub mod null;
pub mod redis;
pub mod user;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use self::in_memory::InMemoryStore;
pub use self::null::NullStore;
pub use self::redis::RedisStore;
pub use self::user::UserCache;

/// Counter store failures
///
/// A miss is not an error: reads return `Ok(None)`. Every variant here is a
/// soft failure for callers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(#[from] ::redis::RedisError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cache value is not a counter: {0}")]
    InvalidCounter(String),
}

/// Result type alias for counter store operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Get/set/increment/delete of string-valued, TTL-bearing keys
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a value; `None` is a miss
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Write a value that expires after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Remove a key; removing an absent key succeeds
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Atomically increment the counter at `key`.
    ///
    /// A missing key is created at 1 and expires after `window`.
    async fn increment(&self, key: &str, window: Duration) -> CacheResult<i64>;

    /// Whether an unexpired value exists at `key`
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Liveness probe
    async fn ping(&self) -> CacheResult<()>;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Cache key builders
pub mod keys {
    use crate::users::validation::normalize_email;

    /// Prefix for user records keyed by ID
    pub const USER_ID_PREFIX: &str = "user:id:";
    /// Prefix for user records keyed by normalized email
    pub const USER_EMAIL_PREFIX: &str = "user:email:";
    /// Prefix for rate limit counters
    pub const RATE_LIMIT_PREFIX: &str = "ratelimit:";
    /// Key used by the rate limiter backend probe
    pub const RATE_LIMIT_PROBE: &str = "ratelimit:init:probe";

    /// User cache key by ID
    pub fn user_by_id(id: i64) -> String {
        format!("{}{}", USER_ID_PREFIX, id)
    }

    /// User cache key by email
    pub fn user_by_email(email: &str) -> String {
        format!("{}{}", USER_EMAIL_PREFIX, normalize_email(email))
    }

    /// Rate limit counter key for a client
    pub fn rate_limit(client: &str) -> String {
        format!("{}{}", RATE_LIMIT_PREFIX, client)
    }
}
