//! No-op counter store
//!
//! Installed when Redis is disabled or unreachable so that every caller runs
//! unmodified: reads miss, writes succeed, counters stay at zero.

use std::time::Duration;

use async_trait::async_trait;

use super::{CacheResult, CounterStore};

/// Always-miss, always-succeed counter store
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl NullStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CounterStore for NullStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn increment(&self, _key: &str, _window: Duration) -> CacheResult<i64> {
        Ok(0)
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "null"
    }
}
