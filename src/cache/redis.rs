//! Redis counter store
//!
//! Every command is issued under a deadline; an expired deadline surfaces as
//! [`CacheError::Timeout`] rather than a hung request.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::AsyncCommands;

use super::{CacheError, CacheResult, CounterStore};

/// INCR and arm the window TTL in one round-trip, atomically
static INCREMENT_SCRIPT: Lazy<redis::Script> = Lazy::new(|| {
    redis::Script::new(
        r"
        local count = redis.call('INCR', KEYS[1])
        if count == 1 then
            redis.call('PEXPIRE', KEYS[1], ARGV[1])
        end
        return count
        ",
    )
});

/// Redis-backed counter store
#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
    op_timeout: Duration,
}

impl RedisStore {
    /// Create a new Redis store
    pub fn new(conn: redis::aio::ConnectionManager, op_timeout: Duration) -> Self {
        Self { conn, op_timeout }
    }

    /// Connect to Redis at `url`
    pub async fn connect(url: &str, op_timeout: Duration) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(op_timeout, redis::aio::ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout(op_timeout))??;
        Ok(Self::new(conn, op_timeout))
    }

    async fn bounded<T, F>(&self, fut: F) -> CacheResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }
}

/// Redis `SET EX` takes whole seconds; never round a live TTL down to zero
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        self.bounded(conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        self.bounded(conn.set_ex::<_, _, ()>(key, value, ttl_seconds(ttl)))
            .await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        self.bounded(conn.del::<_, ()>(key)).await
    }

    async fn increment(&self, key: &str, window: Duration) -> CacheResult<i64> {
        let mut conn = self.conn.clone();
        let window_ms = window.as_millis().max(1) as u64;
        self.bounded(
            INCREMENT_SCRIPT
                .key(key)
                .arg(window_ms)
                .invoke_async::<_, i64>(&mut conn),
        )
        .await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        self.bounded(conn.exists::<_, bool>(key)).await
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let pong: String = self
            .bounded(redis::cmd("PING").query_async::<_, String>(&mut conn))
            .await?;
        tracing::trace!(reply = %pong, "Redis ping");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
