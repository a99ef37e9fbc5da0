//! Multi-Level Cache: L1 in-process (DashMap), L2 fast key-value
//! store, L3 structured store. Read-through with promotion on hit, fan-out
//! writes, tag-based invalidation, and pluggable L1 eviction.

use super::entry::L1Entry;
use super::events::{CacheEvent, CacheEventKind, EVENT_CHANNEL_CAPACITY};
use super::eviction::{EvictionPolicy, LruPolicy};
use super::metrics::{CacheAnalytics, CacheLayer};
use crate::clock::ClockRef;
use crate::config::CacheConfig;
use crate::domain::ports::{KeyValueAdapterRef, StructuredStoreAdapterRef};
use crate::error::Result;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const L3_TABLE: &str = "multi_level_cache_l3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layers {
    pub l1: bool,
    pub l2: bool,
    pub l3: bool,
}

impl Default for Layers {
    fn default() -> Self {
        Self { l1: true, l2: true, l3: true }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub ttl: Option<Duration>,
    pub tags: BTreeSet<String>,
    pub priority: i32,
    pub layers: Layers,
}

/// The top-level read-through/write-fan-out cache. L2/L3 are optional so
/// the cache degrades to an L1-only in-process cache when unconfigured.
pub struct MultiLevelCache {
    clock: ClockRef,
    config: CacheConfig,
    l1: DashMap<String, L1Entry>,
    l2: Option<KeyValueAdapterRef>,
    l3: Option<StructuredStoreAdapterRef>,
    eviction: RwLock<Box<dyn EvictionPolicy>>,
    tag_index: RwLock<HashMap<String, BTreeSet<String>>>,
    analytics: CacheAnalytics,
    events: broadcast::Sender<CacheEvent>,
    sliding_ttl: bool,
}

impl MultiLevelCache {
    pub fn new(
        clock: ClockRef,
        config: CacheConfig,
        l2: Option<KeyValueAdapterRef>,
        l3: Option<StructuredStoreAdapterRef>,
        sliding_ttl: bool,
    ) -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            clock,
            l1: DashMap::new(),
            l2,
            l3,
            eviction: RwLock::new(Box::new(LruPolicy)),
            tag_index: RwLock::new(HashMap::new()),
            analytics: CacheAnalytics::new(config.l1_max_size.max(1)),
            events: tx,
            sliding_ttl,
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn analytics(&self) -> &CacheAnalytics {
        &self.analytics
    }

    pub fn set_eviction_policy(&self, policy: Box<dyn EvictionPolicy>) {
        // Pure snapshot-selection policies have nothing to migrate on swap.
        *self.eviction.write() = policy;
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, opts: SetOptions) -> Result<()> {
        let now = self.clock.now();
        let ttl = opts.ttl.unwrap_or(self.config.l1_ttl);

        if opts.layers.l1 {
            self.enforce_l1_capacity();
            let entry = L1Entry::new(key, value.clone(), now, ttl, opts.tags.clone(), opts.priority);
            self.l1.insert(key.to_string(), entry);
            self.index_tags(key, &opts.tags);
        }

        let l2_ttl = opts.ttl.unwrap_or(self.config.l2_ttl);
        let l3_fut = async {
            if opts.layers.l3 {
                if let Some(l3) = &self.l3 {
                    l3.put(L3_TABLE, key, value.clone()).await?;
                }
            }
            Result::Ok(())
        };
        let l2_fut = async {
            if opts.layers.l2 {
                if let Some(l2) = &self.l2 {
                    l2.set(key, value, Some(l2_ttl)).await?;
                }
            }
            Result::Ok(())
        };
        let (l2_res, l3_res) = tokio::join!(l2_fut, l3_fut);
        l2_res?;
        l3_res?;

        self.publish(CacheEventKind::Set, key, CacheLayer::L1, true, now);
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let start = std::time::Instant::now();
        let now = self.clock.now();

        if let Some(mut entry) = self.l1.get_mut(key) {
            if !entry.is_expired(now) {
                if self.sliding_ttl {
                    entry.touch_sliding(now);
                }
                entry.access_count += 1;
                entry.accessed_at = now;
                let value = entry.value.clone();
                drop(entry);
                self.analytics.record_hit(CacheLayer::L1, key, start.elapsed());
                self.publish(CacheEventKind::Get, key, CacheLayer::L1, true, now);
                return Ok(Some(value));
            }
            drop(entry);
            self.l1.remove(key);
        }
        self.analytics.record_miss(CacheLayer::L1, start.elapsed());

        if let Some(l2) = &self.l2 {
            let l2_start = std::time::Instant::now();
            if let Some(value) = l2.get(key).await? {
                self.analytics.record_hit(CacheLayer::L2, key, l2_start.elapsed());
                self.publish(CacheEventKind::Get, key, CacheLayer::L2, true, now);
                self.promote_to_l1(key, value.clone(), now, BTreeSet::new(), 0);
                return Ok(Some(value));
            }
            self.analytics.record_miss(CacheLayer::L2, l2_start.elapsed());
        }

        if let Some(l3) = &self.l3 {
            let l3_start = std::time::Instant::now();
            if let Some(value) = l3.get(L3_TABLE, key).await? {
                self.analytics.record_hit(CacheLayer::L3, key, l3_start.elapsed());
                self.publish(CacheEventKind::Get, key, CacheLayer::L3, true, now);
                if let Some(l2) = &self.l2 {
                    let _ = l2.set(key, value.clone(), Some(self.config.l2_ttl)).await;
                }
                self.promote_to_l1(key, value.clone(), now, BTreeSet::new(), 0);
                return Ok(Some(value));
            }
            self.analytics.record_miss(CacheLayer::L3, l3_start.elapsed());
        }

        self.publish(CacheEventKind::Get, key, CacheLayer::L3, false, now);
        Ok(None)
    }

    fn promote_to_l1(&self, key: &str, value: Vec<u8>, now: chrono::DateTime<chrono::Utc>, tags: BTreeSet<String>, priority: i32) {
        self.enforce_l1_capacity();
        let entry = L1Entry::new(key, value, now, self.config.l1_ttl, tags.clone(), priority);
        self.l1.insert(key.to_string(), entry);
        self.index_tags(key, &tags);
    }

    fn enforce_l1_capacity(&self) {
        while self.l1.len() >= self.config.l1_max_size {
            let snapshot: HashMap<String, L1Entry> = self.l1.iter().map(|e| (e.key().clone(), e.value().clone())).collect();
            let Some(victim) = self.eviction.read().select_victim(&snapshot) else { break };
            self.l1.remove(&victim);
            self.untag(&victim);
            self.publish(CacheEventKind::Evict, &victim, CacheLayer::L1, false, self.clock.now());
            debug!(key = %victim, "evicted L1 entry");
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.l1.remove(key);
        self.untag(key);
        if let Some(l2) = &self.l2 {
            if let Err(e) = l2.del(key).await {
                warn!(key, error = %e, "L2 delete failed");
            }
        }
        if let Some(l3) = &self.l3 {
            if let Err(e) = l3.delete(L3_TABLE, key).await {
                warn!(key, error = %e, "L3 delete failed");
            }
        }
        self.publish(CacheEventKind::Delete, key, CacheLayer::L1, true, self.clock.now());
        Ok(())
    }

    /// Invalidate every key tagged `tag` across all layers. Returns the
    /// number of distinct keys invalidated (unique keys, not a
    /// per-layer sum).
    pub async fn invalidate_by_tag(&self, tag: &str) -> Result<usize> {
        let keys: Vec<String> = self.tag_index.read().get(tag).map(|s| s.iter().cloned().collect()).unwrap_or_default();
        for key in &keys {
            self.delete(key).await?;
        }
        self.tag_index.write().remove(tag);
        if !keys.is_empty() {
            self.publish(CacheEventKind::Invalidate, tag, CacheLayer::L1, true, self.clock.now());
        }
        Ok(keys.len())
    }

    fn index_tags(&self, key: &str, tags: &BTreeSet<String>) {
        if tags.is_empty() {
            return;
        }
        let mut index = self.tag_index.write();
        for tag in tags {
            index.entry(tag.clone()).or_default().insert(key.to_string());
        }
    }

    fn untag(&self, key: &str) {
        let mut index = self.tag_index.write();
        index.retain(|_, keys| {
            keys.remove(key);
            !keys.is_empty()
        });
    }

    fn publish(&self, kind: CacheEventKind, key: &str, layer: CacheLayer, hit: bool, at: chrono::DateTime<chrono::Utc>) {
        let _ = self.events.send(CacheEvent::new(kind, key, layer, hit, at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::ports::{InMemoryKeyValueStore, InMemoryStructuredStore};

    fn make_cache(l1_max: usize) -> MultiLevelCache {
        let clock: ClockRef = Arc::new(ManualClock::new(chrono::Utc::now()));
        let cfg = CacheConfig { l1_max_size: l1_max, ..Default::default() };
        MultiLevelCache::new(
            clock,
            cfg,
            Some(Arc::new(InMemoryKeyValueStore::new())),
            Some(Arc::new(InMemoryStructuredStore::new())),
            false,
        )
    }

    #[tokio::test]
    async fn set_then_get_hits_l1() {
        let cache = make_cache(100);
        cache.set("k", b"v".to_vec(), SetOptions::default()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(cache.analytics.layer_hits(CacheLayer::L1), 1);
    }

    #[tokio::test]
    async fn l1_miss_falls_through_to_l2_and_promotes() {
        let cache = make_cache(100);
        cache
            .set(
                "k",
                b"v".to_vec(),
                SetOptions { layers: Layers { l1: false, l2: true, l3: false }, ..Default::default() },
            )
            .await
            .unwrap();
        assert!(cache.l1.get("k").is_none());
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert!(cache.l1.get("k").is_some());
    }

    #[tokio::test]
    async fn invalidate_by_tag_removes_all_tagged_keys() {
        let cache = make_cache(100);
        let mut tags = BTreeSet::new();
        tags.insert("group-a".to_string());
        cache.set("a1", b"1".to_vec(), SetOptions { tags: tags.clone(), ..Default::default() }).await.unwrap();
        cache.set("a2", b"2".to_vec(), SetOptions { tags, ..Default::default() }).await.unwrap();
        let count = cache.invalidate_by_tag("group-a").await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(cache.get("a1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn l1_capacity_triggers_eviction() {
        let cache = make_cache(2);
        cache
            .set("a", b"1".to_vec(), SetOptions { layers: Layers { l1: true, l2: false, l3: false }, ..Default::default() })
            .await
            .unwrap();
        cache
            .set("b", b"2".to_vec(), SetOptions { layers: Layers { l1: true, l2: false, l3: false }, ..Default::default() })
            .await
            .unwrap();
        cache
            .set("c", b"3".to_vec(), SetOptions { layers: Layers { l1: true, l2: false, l3: false }, ..Default::default() })
            .await
            .unwrap();
        assert!(cache.l1.len() <= 2);
    }
}
