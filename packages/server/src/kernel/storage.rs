//! In-memory entity storage.
//!
//! Jobs, videos and users live in typed keyed collections; reads over a
//! collection are linearisable with respect to writes on that collection
//! (one `RwLock` per collection, never held across an await). Durability
//! across restarts is an explicit non-goal.
//!
//! The usage ledger is the exception: its daily/monthly counters go through
//! the shared store (with the in-process fallback) so TTL semantics and
//! cross-process visibility match the rest of the control plane.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::domains::auth::User;
use crate::domains::jobs::Job;
use crate::domains::videos::Video;

use super::store::{AtomicStore, MemoryStore, RedisStore};

// ============================================================================
// Keyed collections
// ============================================================================

/// Generic keyed collection with filtered, sorted, paginated listing.
pub struct MemoryCollection<T> {
    items: RwLock<HashMap<String, T>>,
}

impl<T: Clone> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.items.read().get(id).cloned()
    }

    pub fn insert(&self, id: &str, item: T) {
        self.items.write().insert(id.to_string(), item);
    }

    /// Replace an existing item; no-op returning `None` when absent.
    pub fn update(&self, id: &str, item: T) -> Option<T> {
        let mut items = self.items.write();
        if !items.contains_key(id) {
            return None;
        }
        items.insert(id.to_string(), item.clone());
        Some(item)
    }

    pub fn remove(&self, id: &str) -> bool {
        self.items.write().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn count<F>(&self, filter: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        self.items.read().values().filter(|item| filter(item)).count()
    }

    pub fn find<F>(&self, filter: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        self.items.read().values().find(|item| filter(item)).cloned()
    }

    /// Filter, sort and paginate in one pass.
    ///
    /// Returns the requested page and the total match count before paging.
    pub fn page<F, S, K>(
        &self,
        filter: F,
        sort_key: S,
        descending: bool,
        offset: usize,
        limit: usize,
    ) -> (Vec<T>, usize)
    where
        F: Fn(&T) -> bool,
        S: Fn(&T) -> K,
        K: Ord,
    {
        let items = self.items.read();
        let mut matched: Vec<T> = items.values().filter(|item| filter(item)).cloned().collect();
        drop(items);

        let total = matched.len();
        matched.sort_by(|a, b| {
            let ordering = sort_key(a).cmp(&sort_key(b));
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        let page = matched.into_iter().skip(offset).take(limit).collect();
        (page, total)
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }
}

impl<T: Clone> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Usage ledger
// ============================================================================

/// Per-day generation detail for a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageDetail {
    pub videos_generated: u64,
    pub total_duration_seconds: f64,
}

/// Daily/monthly usage counters plus per-day detail records.
pub struct UsageLedger {
    shared: Option<Arc<RedisStore>>,
    fallback: MemoryStore,
    details: RwLock<HashMap<String, UsageDetail>>,
}

impl UsageLedger {
    pub fn new(shared: Option<Arc<RedisStore>>) -> Self {
        Self {
            shared,
            fallback: MemoryStore::new(),
            details: RwLock::new(HashMap::new()),
        }
    }

    fn daily_key(user_id: &str, at: DateTime<Utc>) -> String {
        format!("usage:daily:{user_id}:{}", at.format("%Y-%m-%d"))
    }

    fn monthly_key(user_id: &str, at: DateTime<Utc>) -> String {
        format!("usage:monthly:{user_id}:{}", at.format("%Y-%m"))
    }

    async fn increment(&self, daily_key: &str, monthly_key: &str) -> (i64, i64) {
        if let Some(shared) = &self.shared {
            match shared.usage_increment(daily_key, monthly_key, 1).await {
                Ok(counts) => return counts,
                Err(error) => {
                    warn!(error = %error, "shared store usage increment failed, using local");
                }
            }
        }
        self.fallback
            .usage_increment(daily_key, monthly_key, 1)
            .await
            .unwrap_or((0, 0))
    }

    async fn read_counter(&self, key: &str) -> i64 {
        if let Some(shared) = &self.shared {
            match shared.counter_get(key).await {
                Ok(value) => return value,
                Err(error) => {
                    warn!(error = %error, "shared store counter read failed, using local");
                }
            }
        }
        self.fallback.counter_get(key).await.unwrap_or(0)
    }

    /// Record one generation: bump both counters and fold the detail record.
    pub async fn record(&self, user_id: &str, videos_generated: u64, duration_seconds: f64) {
        let now = Utc::now();
        let daily_key = Self::daily_key(user_id, now);
        let monthly_key = Self::monthly_key(user_id, now);
        self.increment(&daily_key, &monthly_key).await;

        let mut details = self.details.write();
        let entry = details.entry(daily_key).or_default();
        entry.videos_generated += videos_generated;
        entry.total_duration_seconds += duration_seconds;
    }

    /// Requests counted against today's quota.
    pub async fn daily(&self, user_id: &str) -> i64 {
        self.read_counter(&Self::daily_key(user_id, Utc::now())).await
    }

    /// Requests counted against this month.
    pub async fn monthly(&self, user_id: &str) -> i64 {
        self.read_counter(&Self::monthly_key(user_id, Utc::now()))
            .await
    }

    /// Today's generation detail for a user.
    pub fn details_for(&self, user_id: &str) -> UsageDetail {
        let key = Self::daily_key(user_id, Utc::now());
        self.details.read().get(&key).cloned().unwrap_or_default()
    }
}

// ============================================================================
// Storage manager
// ============================================================================

/// Bundles all entity collections and the usage ledger.
pub struct StorageManager {
    pub jobs: MemoryCollection<Job>,
    pub videos: MemoryCollection<Video>,
    pub users: MemoryCollection<User>,
    pub usage: UsageLedger,
}

impl StorageManager {
    pub fn new(shared: Option<Arc<RedisStore>>) -> Self {
        Self {
            jobs: MemoryCollection::new(),
            videos: MemoryCollection::new(),
            users: MemoryCollection::new(),
            usage: UsageLedger::new(shared),
        }
    }

    /// Record usage statistics for a completed generation.
    pub async fn record_usage(&self, user_id: &str, videos_generated: u64, duration_seconds: f64) {
        self.usage
            .record(user_id, videos_generated, duration_seconds)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        rank: u32,
        flagged: bool,
    }

    fn item(id: &str, rank: u32, flagged: bool) -> Item {
        Item {
            id: id.to_string(),
            rank,
            flagged,
        }
    }

    #[test]
    fn test_collection_crud() {
        let collection = MemoryCollection::new();
        collection.insert("a", item("a", 1, false));
        assert!(collection.contains("a"));
        assert_eq!(collection.get("a").unwrap().rank, 1);

        assert!(collection.update("a", item("a", 2, false)).is_some());
        assert_eq!(collection.get("a").unwrap().rank, 2);

        // update-if-present: no upsert
        assert!(collection.update("b", item("b", 1, false)).is_none());
        assert!(!collection.contains("b"));

        assert!(collection.remove("a"));
        assert!(!collection.remove("a"));
    }

    #[test]
    fn test_collection_count_and_find() {
        let collection = MemoryCollection::new();
        collection.insert("a", item("a", 1, true));
        collection.insert("b", item("b", 2, false));
        collection.insert("c", item("c", 3, true));

        assert_eq!(collection.count(|i| i.flagged), 2);
        assert_eq!(collection.find(|i| i.rank == 2).unwrap().id, "b");
        assert!(collection.find(|i| i.rank == 9).is_none());
    }

    #[test]
    fn test_collection_page() {
        let collection = MemoryCollection::new();
        for rank in 1..=5u32 {
            let id = format!("item-{rank}");
            collection.insert(&id, item(&id, rank, rank % 2 == 0));
        }

        // Descending rank, second page of size 2 over all items
        let (page, total) = collection.page(|_| true, |i| i.rank, true, 2, 2);
        assert_eq!(total, 5);
        assert_eq!(
            page.iter().map(|i| i.rank).collect::<Vec<_>>(),
            vec![3, 2]
        );

        // Filter applies before total is computed
        let (page, total) = collection.page(|i| i.flagged, |i| i.rank, false, 0, 10);
        assert_eq!(total, 2);
        assert_eq!(page.iter().map(|i| i.rank).collect::<Vec<_>>(), vec![2, 4]);
    }

    #[tokio::test]
    async fn test_usage_ledger_roundtrip() {
        let ledger = UsageLedger::new(None);
        assert_eq!(ledger.daily("user_dev_001").await, 0);

        ledger.record("user_dev_001", 1, 12.0).await;
        ledger.record("user_dev_001", 1, 8.0).await;

        assert_eq!(ledger.daily("user_dev_001").await, 2);
        assert_eq!(ledger.monthly("user_dev_001").await, 2);

        let detail = ledger.details_for("user_dev_001");
        assert_eq!(detail.videos_generated, 2);
        assert!((detail.total_duration_seconds - 20.0).abs() < f64::EPSILON);

        // Other users unaffected
        assert_eq!(ledger.daily("user_pro_001").await, 0);
    }
}
