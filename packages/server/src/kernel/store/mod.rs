//! Shared-store contract for rate limiting, queues and usage counters.
//!
//! One interface, two backends with identical observable semantics:
//!
//! - [`RedisStore`] — sorted sets and counters in Redis, the atomic
//!   primitives as Lua scripts. Cross-process visible.
//! - [`MemoryStore`] — process-local ordered entries. Used when Redis is
//!   unconfigured or as a per-call fallback when it is unreachable.
//!
//! Only durability and cross-process visibility differ between the two;
//! callers must not be able to tell them apart otherwise.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Failure of a shared-store call. Callers decide the degradation policy
/// (fail open for the rate limiter, fall back to memory for the queue).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("shared store transport error: {0}")]
    Transport(#[from] ::redis::RedisError),
}

/// Outcome of a rate-limit check-and-increment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Unix timestamp at which the window frees up.
    pub reset_at: i64,
}

/// One queue member with its enqueue timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub member: String,
    pub score: f64,
}

/// Atomic primitives over sorted sets and counters.
///
/// Queue ranks are 1-indexed. Scores are Unix timestamps; within a queue,
/// lower score pops first, ties break in a stable arbitrary order.
#[async_trait]
pub trait AtomicStore: Send + Sync {
    /// Sliding-window-log check: GC expired entries, then either record this
    /// request (allowed) or report when the window resets (denied). A denied
    /// call inserts nothing.
    async fn rate_limit_check(
        &self,
        key: &str,
        window_seconds: u64,
        limit: u32,
        now: f64,
        request_id: &str,
    ) -> Result<RateLimitDecision, StoreError>;

    /// GC expired entries and count the rest, without inserting.
    async fn rate_limit_usage(
        &self,
        key: &str,
        window_seconds: u64,
        now: f64,
    ) -> Result<u64, StoreError>;

    /// Insert a member and return its 1-indexed rank.
    async fn queue_push(&self, key: &str, member: &str, score: f64) -> Result<u64, StoreError>;

    /// Remove and return the lowest-score member, or `None` when empty.
    async fn queue_pop(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// 1-indexed rank of a member, or `None` when absent.
    async fn queue_rank(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError>;

    /// Remove a member; `true` if it was present.
    async fn queue_remove(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn queue_len(&self, key: &str) -> Result<u64, StoreError>;

    /// Up to `limit` members in score order with their scores.
    async fn queue_entries(&self, key: &str, limit: usize)
        -> Result<Vec<QueueEntry>, StoreError>;

    /// Increment the daily and monthly counters together, refreshing their
    /// TTLs (~25 h daily, ~32 d monthly). Returns the new values.
    async fn usage_increment(
        &self,
        daily_key: &str,
        monthly_key: &str,
        amount: i64,
    ) -> Result<(i64, i64), StoreError>;

    /// Read a counter; absent or expired keys read as 0.
    async fn counter_get(&self, key: &str) -> Result<i64, StoreError>;
}

/// Current wall clock as fractional Unix seconds.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod contract_tests {
    //! Behavior shared by both backends. Runs against [`MemoryStore`]
    //! unconditionally; the Redis variant needs a live server and is ignored
    //! by default (`cargo test -- --ignored` with REDIS_URL set).

    use super::*;

    async fn exercise_rate_limit(store: &dyn AtomicStore) {
        let key = "rate_limit:contract:default";
        let now = unix_now();

        for i in 0..3 {
            let decision = store
                .rate_limit_check(key, 60, 3, now, &format!("req-{i}"))
                .await
                .unwrap();
            assert!(decision.allowed, "request {i} should be admitted");
            assert_eq!(decision.remaining, 2 - i);
        }

        let denied = store
            .rate_limit_check(key, 60, 3, now, "req-overflow")
            .await
            .unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, (now + 60.0) as i64);

        // Denied call inserted nothing: usage is still 3
        let usage = store.rate_limit_usage(key, 60, now).await.unwrap();
        assert_eq!(usage, 3);

        // Entries age out of the window
        let later = now + 61.0;
        let usage = store.rate_limit_usage(key, 60, later).await.unwrap();
        assert_eq!(usage, 0);
    }

    async fn exercise_queue(store: &dyn AtomicStore) {
        let key = "queue:contract";

        assert_eq!(store.queue_pop(key).await.unwrap(), None);

        assert_eq!(store.queue_push(key, "job_a", 1.0).await.unwrap(), 1);
        assert_eq!(store.queue_push(key, "job_b", 2.0).await.unwrap(), 2);
        assert_eq!(store.queue_push(key, "job_c", 1.5).await.unwrap(), 2);

        assert_eq!(store.queue_len(key).await.unwrap(), 3);
        assert_eq!(store.queue_rank(key, "job_b").await.unwrap(), Some(3));
        assert_eq!(store.queue_rank(key, "missing").await.unwrap(), None);

        let entries = store.queue_entries(key, 10).await.unwrap();
        assert_eq!(
            entries.iter().map(|e| e.member.as_str()).collect::<Vec<_>>(),
            vec!["job_a", "job_c", "job_b"]
        );

        assert_eq!(store.queue_pop(key).await.unwrap().as_deref(), Some("job_a"));
        assert!(store.queue_remove(key, "job_c").await.unwrap());
        assert!(!store.queue_remove(key, "job_c").await.unwrap());
        assert_eq!(store.queue_pop(key).await.unwrap().as_deref(), Some("job_b"));
        assert_eq!(store.queue_pop(key).await.unwrap(), None);
    }

    async fn exercise_usage(store: &dyn AtomicStore) {
        let daily = "usage:daily:contract:2026-08-01";
        let monthly = "usage:monthly:contract:2026-08";

        assert_eq!(store.counter_get(daily).await.unwrap(), 0);
        assert_eq!(
            store.usage_increment(daily, monthly, 1).await.unwrap(),
            (1, 1)
        );
        assert_eq!(
            store.usage_increment(daily, monthly, 2).await.unwrap(),
            (3, 3)
        );
        assert_eq!(store.counter_get(daily).await.unwrap(), 3);
        assert_eq!(store.counter_get(monthly).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_memory_store_contract() {
        let store = MemoryStore::new();
        exercise_rate_limit(&store).await;
        exercise_queue(&store).await;
        exercise_usage(&store).await;
    }

    #[tokio::test]
    #[ignore = "needs a live Redis at REDIS_URL"]
    async fn test_redis_store_contract() {
        let url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379/0".to_string());
        let store = RedisStore::connect(&url).await.expect("redis reachable");
        store.flush_test_keys().await.expect("flush");
        exercise_rate_limit(&store).await;
        exercise_queue(&store).await;
        exercise_usage(&store).await;
    }
}
