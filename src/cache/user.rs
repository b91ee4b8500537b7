//! Dual-keyed user cache
//!
//! Stores JSON snapshots of [`User`] under `user:id:{id}` and
//! `user:email:{normalized email}`. Entries are disposable copies; the TTL is
//! enforced by the backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::{keys, CacheResult, CounterStore};
use crate::routes::metrics::record_cache_operation;
use crate::users::User;

/// Cache-aside primitives for user records
#[derive(Clone)]
pub struct UserCache {
    store: Arc<dyn CounterStore>,
}

impl UserCache {
    /// Create a user cache on top of a counter store
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    pub async fn get_by_id(&self, id: i64) -> CacheResult<Option<User>> {
        self.read("get_by_id", &keys::user_by_id(id)).await
    }

    pub async fn set_by_id(&self, id: i64, user: &User, ttl: Duration) -> CacheResult<()> {
        self.write("set_by_id", &keys::user_by_id(id), user, ttl)
            .await
    }

    pub async fn get_by_email(&self, email: &str) -> CacheResult<Option<User>> {
        self.read("get_by_email", &keys::user_by_email(email))
            .await
    }

    pub async fn set_by_email(&self, email: &str, user: &User, ttl: Duration) -> CacheResult<()> {
        self.write("set_by_email", &keys::user_by_email(email), user, ttl)
            .await
    }

    pub async fn invalidate_by_id(&self, id: i64) -> CacheResult<()> {
        self.remove("invalidate_by_id", &keys::user_by_id(id)).await
    }

    pub async fn invalidate_by_email(&self, email: &str) -> CacheResult<()> {
        self.remove("invalidate_by_email", &keys::user_by_email(email))
            .await
    }

    /// Remove both keys for one user.
    ///
    /// Both deletes are always attempted; the first failure is returned.
    pub async fn invalidate(&self, id: i64, email: &str) -> CacheResult<()> {
        let (by_id, by_email) =
            futures::future::join(self.invalidate_by_id(id), self.invalidate_by_email(email))
                .await;
        by_id.and(by_email)
    }

    async fn read(&self, operation: &'static str, key: &str) -> CacheResult<Option<User>> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                record_cache_operation(operation, "error");
                return Err(e);
            }
        };

        let Some(raw) = raw else {
            debug!(key, "User cache miss");
            record_cache_operation(operation, "miss");
            return Ok(None);
        };

        // An undecodable snapshot is an error, never a hit
        match serde_json::from_str::<User>(&raw) {
            Ok(user) => {
                debug!(key, "User cache hit");
                record_cache_operation(operation, "hit");
                Ok(Some(user))
            }
            Err(e) => {
                record_cache_operation(operation, "error");
                Err(e.into())
            }
        }
    }

    async fn write(
        &self,
        operation: &'static str,
        key: &str,
        user: &User,
        ttl: Duration,
    ) -> CacheResult<()> {
        let result = match serde_json::to_string(user) {
            Ok(serialized) => self.store.set(key, &serialized, ttl).await,
            Err(e) => Err(e.into()),
        };
        record_cache_operation(operation, if result.is_ok() { "ok" } else { "error" });
        result
    }

    async fn remove(&self, operation: &'static str, key: &str) -> CacheResult<()> {
        let result = self.store.delete(key).await;
        record_cache_operation(operation, if result.is_ok() { "ok" } else { "error" });
        result
    }
}
