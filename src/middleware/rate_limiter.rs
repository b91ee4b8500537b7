//! Rate limiting middleware
//!
//! Two interchangeable strategies behind one [`RateLimiter`]:
//!
//! - [`TokenBucketLimiter`]: per-client token bucket held in process memory,
//!   one lock per bucket, swept periodically.
//! - [`DistributedLimiter`]: fixed-window counter on the shared
//!   [`CounterStore`], so every instance of the service sees the same count.
//!
//! The strategy is chosen once, on first use, by probing the store.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::{keys, CacheResult, CounterStore};
use crate::error::AppError;
use crate::routes::metrics::record_rate_limit_decision;
use crate::AppState;

const MINUTE: Duration = Duration::from_secs(60);

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sustained rate, and the per-window limit of the distributed strategy
    pub requests_per_minute: u32,
    /// Token bucket capacity
    pub burst_size: u32,
    /// Fixed window of the distributed strategy
    pub window: Duration,
    /// How often idle buckets are swept
    pub sweep_interval: Duration,
    /// Buckets unused for longer than this are dropped by the sweep
    pub idle_ttl: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_size: 10,
            window: MINUTE,
            sweep_interval: Duration::from_secs(5 * 60),
            idle_ttl: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    fn full(burst_size: u32, now: Instant) -> Self {
        Self {
            tokens: burst_size,
            last_refill: now,
            last_seen: now,
        }
    }

    /// Add `elapsed minutes * rate` whole tokens, capped at the burst size.
    ///
    /// `last_refill` only advances by the time the granted tokens account
    /// for, so partial progress toward the next token carries over.
    fn refill(&mut self, now: Instant, requests_per_minute: u32, burst_size: u32) {
        // Time spent full earns nothing
        if requests_per_minute == 0 || self.tokens >= burst_size {
            self.last_refill = now;
            return;
        }
        let elapsed = now.saturating_duration_since(self.last_refill);
        let rate = u128::from(requests_per_minute);
        let earned = elapsed.as_nanos() * rate / MINUTE.as_nanos();
        if earned == 0 {
            return;
        }

        let refilled = u128::from(self.tokens) + earned;
        if refilled >= u128::from(burst_size) {
            self.tokens = burst_size;
            self.last_refill = now;
        } else {
            // Below the burst size, so `earned` is small
            let spent = earned * MINUTE.as_nanos() / rate;
            self.tokens = refilled as u32;
            self.last_refill += Duration::from_nanos(spent as u64);
        }
    }
}

type BucketMap = RwLock<HashMap<String, Arc<Mutex<Bucket>>>>;

/// In-process token bucket limiter keyed by client
pub struct TokenBucketLimiter {
    config: RateLimitConfig,
    buckets: Arc<BucketMap>,
}

impl TokenBucketLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// Decide for `key` as of `now`
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let bucket = self.bucket(key, now);
        let mut bucket = bucket.lock().unwrap_or_else(|e| e.into_inner());

        bucket.refill(now, self.config.requests_per_minute, self.config.burst_size);
        bucket.last_seen = now;

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Number of tracked clients
    pub fn len(&self) -> usize {
        self.buckets.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop buckets idle longer than the configured TTL as of `now`
    pub fn sweep(&self, now: Instant) -> usize {
        sweep_buckets(&self.buckets, now, self.config.idle_ttl)
    }

    /// Start the periodic sweep.
    ///
    /// The task holds only a weak reference and exits once the limiter is
    /// dropped. Must be called inside a Tokio runtime.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let buckets = Arc::downgrade(&self.buckets);
        let every = self.config.sweep_interval;
        let idle_ttl = self.config.idle_ttl;
        tokio::spawn(sweep_loop(buckets, every, idle_ttl))
    }

    fn bucket(&self, key: &str, now: Instant) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = self
            .buckets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
        {
            return Arc::clone(bucket);
        }

        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            buckets
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Bucket::full(self.config.burst_size, now)))),
        )
    }
}

async fn sweep_loop(buckets: Weak<BucketMap>, every: Duration, idle_ttl: Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(buckets) = buckets.upgrade() else {
            break;
        };
        let removed = sweep_buckets(&buckets, Instant::now(), idle_ttl);
        if removed > 0 {
            debug!(removed, "Swept idle rate limit buckets");
        }
    }
}

fn sweep_buckets(buckets: &BucketMap, now: Instant, idle_ttl: Duration) -> usize {
    let mut buckets = buckets.write().unwrap_or_else(|e| e.into_inner());
    let before = buckets.len();
    buckets.retain(|_, bucket| {
        let bucket = bucket.lock().unwrap_or_else(|e| e.into_inner());
        now.saturating_duration_since(bucket.last_seen) <= idle_ttl
    });
    before - buckets.len()
}

/// Fixed-window counter on a shared store
#[derive(Clone)]
pub struct DistributedLimiter {
    store: Arc<dyn CounterStore>,
    requests_per_minute: u32,
    window: Duration,
}

impl DistributedLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            requests_per_minute: config.requests_per_minute,
            window: config.window,
        }
    }

    /// Count this request and decide. Store failures allow the request.
    pub async fn allow(&self, key: &str) -> bool {
        match self.store.increment(&keys::rate_limit(key), self.window).await {
            Ok(count) => {
                let allowed = count <= i64::from(self.requests_per_minute);
                record_rate_limit_decision("distributed", if allowed { "allowed" } else { "denied" });
                allowed
            }
            Err(e) => {
                warn!(client = key, error = %e, "Rate limit backend failed; allowing request");
                record_rate_limit_decision("distributed", "fail_open");
                true
            }
        }
    }

    /// Requests counted for `key` in the current window
    pub async fn current(&self, key: &str) -> CacheResult<i64> {
        Ok(self
            .store
            .get(&keys::rate_limit(key))
            .await?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0))
    }

    /// Forget the counter for `key`
    pub async fn reset(&self, key: &str) -> CacheResult<()> {
        self.store.delete(&keys::rate_limit(key)).await
    }
}

/// The strategy a [`RateLimiter`] settled on
pub enum Strategy {
    InMemory(TokenBucketLimiter),
    Distributed(DistributedLimiter),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::InMemory(_) => "in_memory",
            Strategy::Distributed(_) => "distributed",
        }
    }
}

/// Rate limiter that picks its strategy on first use
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
    strategy: OnceCell<Strategy>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self {
            config,
            store,
            strategy: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// The selected strategy, probing the store on the first call
    pub async fn strategy(&self) -> &Strategy {
        self.strategy
            .get_or_init(|| async {
                let strategy = if probe(self.store.as_ref()).await {
                    Strategy::Distributed(DistributedLimiter::new(
                        Arc::clone(&self.store),
                        &self.config,
                    ))
                } else {
                    let limiter = TokenBucketLimiter::new(self.config.clone());
                    let _sweeper = limiter.spawn_sweeper();
                    Strategy::InMemory(limiter)
                };
                info!(
                    strategy = strategy.name(),
                    backend = self.store.backend_name(),
                    "Rate limiter initialized"
                );
                strategy
            })
            .await
    }

    pub async fn allow(&self, key: &str) -> bool {
        match self.strategy().await {
            Strategy::InMemory(limiter) => {
                let allowed = limiter.allow(key);
                record_rate_limit_decision("in_memory", if allowed { "allowed" } else { "denied" });
                allowed
            }
            Strategy::Distributed(limiter) => limiter.allow(key).await,
        }
    }

    /// Seconds a denied client should wait before retrying
    pub async fn retry_after_secs(&self) -> u64 {
        match self.strategy().await {
            Strategy::InMemory(_) => {
                let rpm = u64::from(self.config.requests_per_minute.max(1));
                MINUTE.as_secs().div_ceil(rpm)
            }
            Strategy::Distributed(_) => self.config.window.as_secs(),
        }
    }
}

/// Whether `store` round-trips a value, i.e. is a live shared backend
async fn probe(store: &dyn CounterStore) -> bool {
    const PROBE_VALUE: &str = "probe";

    if let Err(e) = store
        .set(keys::RATE_LIMIT_PROBE, PROBE_VALUE, Duration::from_secs(1))
        .await
    {
        debug!(error = %e, "Rate limiter probe write failed");
        return false;
    }
    let live = match store.get(keys::RATE_LIMIT_PROBE).await {
        Ok(value) => value.as_deref() == Some(PROBE_VALUE),
        Err(e) => {
            debug!(error = %e, "Rate limiter probe read failed");
            false
        }
    };
    if let Err(e) = store.delete(keys::RATE_LIMIT_PROBE).await {
        debug!(error = %e, "Rate limiter probe cleanup failed");
    }
    live
}

/// Client identity for rate limiting.
///
/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address.
pub fn client_ip(request: &Request) -> String {
    let headers = request.headers();
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return real_ip.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware
///
/// Runs before routing and auth; denied requests get a 429.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_ip(&request);

    if state.rate_limiter.allow(&client).await {
        return next.run(request).await;
    }

    warn!(client = %client, "Rate limit exceeded");
    AppError::RateLimitExceeded {
        limit: state.rate_limiter.config().requests_per_minute,
        retry_after_secs: state.rate_limiter.retry_after_secs().await,
    }
    .into_response()
}
