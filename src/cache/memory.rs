//! In-process bucket store.
//!
//! Keeps buckets in an LRU map per namespace. Contents are lost on restart,
//! so this backend suits tests, previews and single-node deployments that
//! tolerate losing pagination state.

use std::sync::Mutex;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use serde_json::Value;
use time::OffsetDateTime;

use crate::application::store::{BucketStore, Lifetime, StoreError};
use crate::domain::buckets::BucketNamespace;

use super::config::BucketStoreConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::memory";
const METRIC_BUCKET_EVICT: &str = "bucket_pagination_evict_total";

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<OffsetDateTime>,
}

impl Entry {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

pub struct MemoryBucketStore {
    namespace: BucketNamespace,
    default_lifetime: Lifetime,
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryBucketStore {
    pub fn new(namespace: BucketNamespace, config: &BucketStoreConfig) -> Self {
        Self {
            namespace,
            default_lifetime: config.default_lifetime(),
            entries: Mutex::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    /// Number of stored buckets, expired ones included until collected.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw stored value, bypassing expiry. Useful for inspecting what a
    /// paginator actually persisted.
    pub fn peek(&self, id: &str) -> Option<Value> {
        mutex_lock(&self.entries, SOURCE, "peek")
            .peek(id)
            .map(|entry| entry.value.clone())
    }

    fn live_entry(&self, id: &str, op: &'static str) -> Option<Entry> {
        let now = OffsetDateTime::now_utc();
        let mut entries = mutex_lock(&self.entries, SOURCE, op);
        let entry = entries.get(id)?.clone();
        if entry.is_expired(now) {
            entries.pop(id);
            return None;
        }
        Some(entry)
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    fn namespace(&self) -> BucketNamespace {
        self.namespace
    }

    async fn has(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.live_entry(id, "has").is_some())
    }

    async fn get(&self, id: &str) -> Result<Value, StoreError> {
        self.live_entry(id, "get")
            .map(|entry| entry.value)
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn set(&self, id: &str, value: Value, lifetime: Lifetime) -> Result<(), StoreError> {
        let expires_at = lifetime.expires_at(self.default_lifetime, OffsetDateTime::now_utc());

        let evicted = mutex_lock(&self.entries, SOURCE, "set")
            .push(id.to_string(), Entry { value, expires_at })
            .filter(|(evicted_id, _)| evicted_id != id);
        if evicted.is_some() {
            counter!(METRIC_BUCKET_EVICT, "namespace" => self.namespace.as_str()).increment(1);
        }
        Ok(())
    }

    async fn collect_garbage(&self) -> Result<u64, StoreError> {
        let now = OffsetDateTime::now_utc();
        let mut entries = mutex_lock(&self.entries, SOURCE, "collect_garbage");
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            entries.pop(id);
        }
        Ok(expired.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use serde_json::json;

    use super::*;

    fn store() -> MemoryBucketStore {
        MemoryBucketStore::new(BucketNamespace::Materialized, &BucketStoreConfig::default())
    }

    fn insert_expired(store: &MemoryBucketStore, id: &str) {
        store.entries.lock().expect("fresh lock").put(
            id.to_string(),
            Entry {
                value: json!({"stale": true}),
                expires_at: Some(OffsetDateTime::now_utc() - time::Duration::seconds(1)),
            },
        );
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let store = store();
        assert!(!store.has("a").await.unwrap());

        store.set("a", json!([1, 2]), Lifetime::Default).await.unwrap();

        assert!(store.has("a").await.unwrap());
        assert_eq!(store.get("a").await.unwrap(), json!([1, 2]));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let err = store().get("missing").await.expect_err("nothing stored");
        assert!(matches!(err, StoreError::NotFound { id } if id == "missing"));
    }

    #[tokio::test]
    async fn set_overwrites_existing_bucket() {
        let store = store();
        store.set("a", json!(1), Lifetime::Default).await.unwrap();
        store.set("a", json!(2), Lifetime::Unlimited).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), json!(2));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn expired_buckets_are_invisible() {
        let store = store();
        insert_expired(&store, "old");

        assert!(!store.has("old").await.unwrap());
        assert!(store.get("old").await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn collect_garbage_drops_only_expired() {
        let store = store();
        insert_expired(&store, "old");
        store.set("fresh", json!(1), Lifetime::Default).await.unwrap();

        assert_eq!(store.collect_garbage().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.has("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let config = BucketStoreConfig {
            memory_capacity: 2,
            ..Default::default()
        };
        let store = MemoryBucketStore::new(BucketNamespace::DataSource, &config);
        store.set("one", json!(1), Lifetime::Default).await.unwrap();
        store.set("two", json!(2), Lifetime::Default).await.unwrap();
        assert!(store.has("one").await.unwrap());

        store.set("three", json!(3), Lifetime::Default).await.unwrap();

        assert!(store.has("one").await.unwrap());
        assert!(!store.has("two").await.unwrap()); // evicted
        assert!(store.has("three").await.unwrap());
    }

    #[tokio::test]
    async fn store_recovers_from_poisoned_lock() {
        let store = store();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .lock()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.set("a", json!(1), Lifetime::Default).await.unwrap();
        assert!(store.has("a").await.unwrap());
    }
}
