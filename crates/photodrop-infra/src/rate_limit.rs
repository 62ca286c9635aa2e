//! Per-identity admission control.
//!
//! Fixed-window point budget: each identity may spend `points` within a window of
//! `window` that starts with its first request. The full budget is available as a
//! burst at window start.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const DEFAULT_SHARD_COUNT: usize = 16;
const DEFAULT_MAX_BUCKETS: usize = 10_000;

/// Result of `RateLimiter::consume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    /// Seconds until at least one point is restored, never below 1.
    Denied { retry_after_secs: u64 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    spent: u32,
    reset_at: Instant,
}

impl Bucket {
    fn new(now: Instant, window: Duration) -> Self {
        Self {
            spent: 0,
            reset_at: now + window,
        }
    }

    fn consume(&mut self, now: Instant, points: u32, window: Duration) -> RateLimitDecision {
        if now >= self.reset_at {
            self.spent = 0;
            self.reset_at = now + window;
        }

        if self.spent < points {
            self.spent += 1;
            RateLimitDecision::Allowed {
                remaining: points - self.spent,
            }
        } else {
            RateLimitDecision::Denied {
                retry_after_secs: ceil_secs(self.reset_at.saturating_duration_since(now)),
            }
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

/// Sharded in-memory rate limiter.
///
/// Identities are hashed onto shards, each guarded by its own mutex, so concurrent
/// requests for one identity are serialized on that shard and no decrement is lost.
#[derive(Clone)]
pub struct RateLimiter {
    shards: Vec<Arc<Mutex<HashMap<String, Bucket>>>>,
    points: u32,
    window: Duration,
    max_buckets: usize,
}

impl RateLimiter {
    /// `points` requests per `window_secs` seconds, 16 shards.
    pub fn new(points: u32, window_secs: u64) -> Self {
        Self::with_shards(points, window_secs, DEFAULT_SHARD_COUNT)
    }

    pub fn with_shards(points: u32, window_secs: u64, shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(HashMap::new())))
            .collect();
        Self {
            shards,
            points,
            window: Duration::from_secs(window_secs),
            max_buckets: DEFAULT_MAX_BUCKETS,
        }
    }

    /// Cap on identities tracked per shard.
    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets.max(1);
        self
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    fn shard_index(&self, identity: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        identity.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    /// Spend one point for `identity`.
    pub async fn consume(&self, identity: &str) -> RateLimitDecision {
        let shard_index = self.shard_index(identity);
        let mut buckets = self.shards[shard_index].lock().await;
        let now = Instant::now();

        if buckets.len() >= self.max_buckets && !buckets.contains_key(identity) {
            buckets.retain(|_, bucket| bucket.reset_at > now);

            // Still full: evict the bucket closest to reset
            if buckets.len() >= self.max_buckets {
                let oldest = buckets
                    .iter()
                    .min_by_key(|(_, bucket)| bucket.reset_at)
                    .map(|(key, _)| key.clone());
                if let Some(key) = oldest {
                    buckets.remove(&key);
                    tracing::debug!(
                        shard_index = shard_index,
                        remaining_buckets = buckets.len(),
                        "Evicted oldest rate limit bucket due to capacity limit"
                    );
                }
            }
        }

        buckets
            .entry(identity.to_string())
            .or_insert_with(|| Bucket::new(now, self.window))
            .consume(now, self.points, self.window)
    }

    /// Drop buckets whose window has ended. Returns the number removed.
    pub async fn cleanup_expired_buckets(&self) -> usize {
        let now = Instant::now();
        let cleaned: usize = futures::future::join_all(self.shards.iter().map(|shard| async move {
            let mut buckets = shard.lock().await;
            let before = buckets.len();
            buckets.retain(|_, bucket| bucket.reset_at > now);
            before - buckets.len()
        }))
        .await
        .into_iter()
        .sum();

        if cleaned > 0 {
            tracing::debug!(
                buckets_cleaned = cleaned,
                "Cleaned up expired rate limit buckets"
            );
        }
        cleaned
    }

    /// Number of identities currently tracked.
    pub async fn bucket_count(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }

    /// Run `cleanup_expired_buckets` every `interval` until the task is aborted.
    pub fn spawn_cleanup_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.cleanup_expired_buckets().await;
            }
        })
    }
}
