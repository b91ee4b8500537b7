//! In-memory counter store
//!
//! This module provides a process-local store that can be used in place of
//! Redis during integration testing, eliminating the need for a real Redis
//! instance. Unlike [`super::NullStore`] it actually remembers values, so it
//! passes the rate limiter's liveness probe and behaves like a shared backend
//! for every limiter holding the same `Arc`.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{CacheError, CacheResult, CounterStore};

/// Entry in the in-memory store with expiration
struct StoreEntry {
    value: String,
    expires_at: Instant,
}

impl StoreEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory TTL store
///
/// # Thread Safety
///
/// Uses RwLock for interior mutability, allowing concurrent reads. Increments
/// hold the write lock for the whole read-modify-write, so no update is lost.
#[derive(Default)]
pub struct InMemoryStore {
    data: RwLock<HashMap<String, StoreEntry>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.read().values().filter(|e| !e.is_expired(now)).count()
    }

    /// Whether the store holds no unexpired keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries (useful for test isolation)
    pub fn clear(&self) {
        self.write().clear();
    }

    // A poisoned lock only means another thread panicked mid-operation;
    // each operation leaves the map consistent, so keep serving.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, StoreEntry>> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, StoreEntry>> {
        self.data.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        Ok(self
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.write().insert(
            key.to_string(),
            StoreEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.write().remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str, window: Duration) -> CacheResult<i64> {
        let now = Instant::now();
        let mut data = self.write();

        match data.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                let current: i64 = entry
                    .value
                    .parse()
                    .map_err(|_| CacheError::InvalidCounter(key.to_string()))?;
                let next = current + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            _ => {
                data.insert(
                    key.to_string(),
                    StoreEntry {
                        value: "1".to_string(),
                        expires_at: now + window,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        Ok(self
            .read()
            .get(key)
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false))
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
