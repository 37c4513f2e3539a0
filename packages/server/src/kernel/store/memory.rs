//! In-process shared-store fallback.
//!
//! Same observable semantics as the Redis backend over process-local state:
//! sorted entry lists stand in for sorted sets, a counter map with lazy
//! expiry stands in for INCRBY/EXPIRE. Safe for the single-process
//! cooperative runtime; no cross-process visibility.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::{unix_now, AtomicStore, QueueEntry, RateLimitDecision, StoreError};

/// TTLs matching the Redis usage script.
const DAILY_TTL_SECONDS: f64 = 90_000.0;
const MONTHLY_TTL_SECONDS: f64 = 2_764_800.0;

struct Counter {
    value: i64,
    expires_at: Option<f64>,
}

#[derive(Default)]
struct Inner {
    /// Sorted sets: entries kept ordered by score, insertion-stable on ties.
    sets: HashMap<String, Vec<(f64, String)>>,
    counters: HashMap<String, Counter>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Drop everything (tests).
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.sets.clear();
        inner.counters.clear();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn gc_window(entries: &mut Vec<(f64, String)>, cutoff: f64) {
    entries.retain(|(score, _)| *score > cutoff);
}

fn sorted_insert(entries: &mut Vec<(f64, String)>, score: f64, member: String) -> usize {
    // Stable on equal scores: new entries go after existing ones.
    let index = entries.partition_point(|(s, _)| *s <= score);
    entries.insert(index, (score, member));
    index
}

fn counter_value(counters: &mut HashMap<String, Counter>, key: &str, now: f64) -> i64 {
    match counters.get(key) {
        Some(counter) => {
            if counter.expires_at.is_some_and(|at| at <= now) {
                counters.remove(key);
                0
            } else {
                counter.value
            }
        }
        None => 0,
    }
}

#[async_trait]
impl AtomicStore for MemoryStore {
    async fn rate_limit_check(
        &self,
        key: &str,
        window_seconds: u64,
        limit: u32,
        now: f64,
        request_id: &str,
    ) -> Result<RateLimitDecision, StoreError> {
        let mut inner = self.inner.lock();
        let entries = inner.sets.entry(key.to_string()).or_default();
        gc_window(entries, now - window_seconds as f64);

        let count = entries.len() as u32;
        if count < limit {
            sorted_insert(entries, now, request_id.to_string());
            Ok(RateLimitDecision {
                allowed: true,
                remaining: limit - count - 1,
                reset_at: (now + window_seconds as f64) as i64,
            })
        } else {
            let oldest = entries.first().map(|(score, _)| *score).unwrap_or(now);
            Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: (oldest + window_seconds as f64) as i64,
            })
        }
    }

    async fn rate_limit_usage(
        &self,
        key: &str,
        window_seconds: u64,
        now: f64,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let entries = inner.sets.entry(key.to_string()).or_default();
        gc_window(entries, now - window_seconds as f64);
        Ok(entries.len() as u64)
    }

    async fn queue_push(&self, key: &str, member: &str, score: f64) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let entries = inner.sets.entry(key.to_string()).or_default();
        let index = sorted_insert(entries, score, member.to_string());
        Ok(index as u64 + 1)
    }

    async fn queue_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.inner.lock();
        let Some(entries) = inner.sets.get_mut(key) else {
            return Ok(None);
        };
        if entries.is_empty() {
            return Ok(None);
        }
        let (_, member) = entries.remove(0);
        Ok(Some(member))
    }

    async fn queue_rank(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.sets.get(key).and_then(|entries| {
            entries
                .iter()
                .position(|(_, m)| m == member)
                .map(|index| index as u64 + 1)
        }))
    }

    async fn queue_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(entries) = inner.sets.get_mut(key) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|(_, m)| m != member);
        Ok(entries.len() < before)
    }

    async fn queue_len(&self, key: &str) -> Result<u64, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.sets.get(key).map(|e| e.len() as u64).unwrap_or(0))
    }

    async fn queue_entries(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .sets
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .take(limit)
                    .map(|(score, member)| QueueEntry {
                        member: member.clone(),
                        score: *score,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn usage_increment(
        &self,
        daily_key: &str,
        monthly_key: &str,
        amount: i64,
    ) -> Result<(i64, i64), StoreError> {
        let now = unix_now();
        let mut inner = self.inner.lock();

        let daily = counter_value(&mut inner.counters, daily_key, now) + amount;
        inner.counters.insert(
            daily_key.to_string(),
            Counter {
                value: daily,
                expires_at: Some(now + DAILY_TTL_SECONDS),
            },
        );

        let monthly = counter_value(&mut inner.counters, monthly_key, now) + amount;
        inner.counters.insert(
            monthly_key.to_string(),
            Counter {
                value: monthly,
                expires_at: Some(now + MONTHLY_TTL_SECONDS),
            },
        );

        Ok((daily, monthly))
    }

    async fn counter_get(&self, key: &str) -> Result<i64, StoreError> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        Ok(counter_value(&mut inner.counters, key, now))
    }
}
