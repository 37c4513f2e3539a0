//! Redis-backed shared store.
//!
//! Uses a `ConnectionManager` (auto-reconnecting, cheap to clone) and the Lua
//! scripts in `kernel::scripts` for the atomic primitives. Everything else is
//! plain commands.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::kernel::scripts::Scripts;

use super::{AtomicStore, QueueEntry, RateLimitDecision, StoreError};

pub struct RedisStore {
    conn: ConnectionManager,
    scripts: Scripts,
}

impl RedisStore {
    /// Connect and verify the server responds to PING.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self {
            conn,
            scripts: Scripts::new(),
        })
    }

    /// Round-trip latency of a PING, in milliseconds.
    pub async fn ping_latency_ms(&self) -> Result<f64, StoreError> {
        let mut conn = self.conn.clone();
        let start = std::time::Instant::now();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(start.elapsed().as_secs_f64() * 1000.0)
    }

    /// Delete the keys used by the store contract tests.
    pub async fn flush_test_keys(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(vec![
                "rate_limit:contract:default",
                "queue:contract",
                "usage:daily:contract:2026-08-01",
                "usage:monthly:contract:2026-08",
            ])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AtomicStore for RedisStore {
    async fn rate_limit_check(
        &self,
        key: &str,
        window_seconds: u64,
        limit: u32,
        now: f64,
        request_id: &str,
    ) -> Result<RateLimitDecision, StoreError> {
        let mut conn = self.conn.clone();
        let (allowed, remaining, reset_at): (i64, i64, i64) = self
            .scripts
            .rate_limit
            .key(key)
            .arg(window_seconds)
            .arg(limit)
            .arg(now)
            .arg(request_id)
            .invoke_async(&mut conn)
            .await?;

        Ok(RateLimitDecision {
            allowed: allowed != 0,
            remaining: remaining.max(0) as u32,
            reset_at,
        })
    }

    async fn rate_limit_usage(
        &self,
        key: &str,
        window_seconds: u64,
        now: f64,
    ) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let cutoff = now - window_seconds as f64;
        let _removed: i64 = conn.zrembyscore(key, 0f64, cutoff).await?;
        let count: u64 = conn.zcard(key).await?;
        Ok(count)
    }

    async fn queue_push(&self, key: &str, member: &str, score: f64) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let rank: i64 = self
            .scripts
            .queue_enqueue
            .key(key)
            .arg(member)
            .arg(score)
            .invoke_async(&mut conn)
            .await?;
        Ok(rank.max(1) as u64)
    }

    async fn queue_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let member: Option<String> = self
            .scripts
            .queue_dequeue
            .key(key)
            .invoke_async(&mut conn)
            .await?;
        Ok(member)
    }

    async fn queue_rank(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self.conn.clone();
        let rank: i64 = self
            .scripts
            .queue_rank
            .key(key)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;
        Ok(if rank > 0 { Some(rank as u64) } else { None })
    }

    async fn queue_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.zrem(key, member).await?;
        Ok(removed > 0)
    }

    async fn queue_len(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.zcard(key).await?;
        Ok(len)
    }

    async fn queue_entries(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        let mut conn = self.conn.clone();
        let stop = limit as isize - 1;
        let entries: Vec<(String, f64)> = conn.zrange_withscores(key, 0, stop).await?;
        Ok(entries
            .into_iter()
            .map(|(member, score)| QueueEntry { member, score })
            .collect())
    }

    async fn usage_increment(
        &self,
        daily_key: &str,
        monthly_key: &str,
        amount: i64,
    ) -> Result<(i64, i64), StoreError> {
        let mut conn = self.conn.clone();
        let (daily, monthly): (i64, i64) = self
            .scripts
            .usage_increment
            .key(daily_key)
            .key(monthly_key)
            .arg(amount)
            .invoke_async(&mut conn)
            .await?;
        Ok((daily, monthly))
    }

    async fn counter_get(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }
}
