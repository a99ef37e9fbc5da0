//! Cache Invalidation Manager: tag-based and pattern-based
//! invalidation, a dependency graph for cascading invalidation, and a
//! bounded history of invalidation events, with optional peer fan-out
//! over a pub/sub channel.

use super::manager::MultiLevelCache;
use crate::config::InvalidationConfig;
use crate::domain::ports::KeyValueAdapterRef;
use crate::error::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    Manual,
    TtlExpired,
    TagInvalidated,
    CascadeDependency,
    PatternMatch,
    PeerNotification,
}

#[derive(Debug, Clone)]
pub struct InvalidationEvent {
    pub key: String,
    pub reason: InvalidationReason,
    pub at: DateTime<Utc>,
}

/// Coordinates invalidation across the [`MultiLevelCache`]: direct
/// key/tag/pattern invalidation, cascading through a declared dependency
/// graph, and an append-bounded history for observability.
pub struct InvalidationManager {
    cache: Arc<MultiLevelCache>,
    config: InvalidationConfig,
    /// key -> set of keys that depend on it (invalidated transitively).
    dependents: RwLock<HashMap<String, BTreeSet<String>>>,
    history: RwLock<VecDeque<InvalidationEvent>>,
    peer_channel: Option<KeyValueAdapterRef>,
}

impl InvalidationManager {
    pub fn new(cache: Arc<MultiLevelCache>, config: InvalidationConfig, peer_channel: Option<KeyValueAdapterRef>) -> Self {
        Self {
            cache,
            config,
            dependents: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            peer_channel,
        }
    }

    /// Declare that `dependent` must be invalidated whenever `depends_on`
    /// is invalidated.
    pub fn declare_dependency(&self, depends_on: &str, dependent: &str) {
        self.dependents.write().entry(depends_on.to_string()).or_default().insert(dependent.to_string());
    }

    pub async fn invalidate_key(&self, key: &str, reason: InvalidationReason) -> Result<()> {
        self.cache.delete(key).await?;
        self.record(key, reason);
        self.cascade(key, 0).await?;
        self.notify_peers(key).await;
        Ok(())
    }

    pub async fn invalidate_tag(&self, tag: &str) -> Result<usize> {
        let count = self.cache.invalidate_by_tag(tag).await?;
        self.record(tag, InvalidationReason::TagInvalidated);
        self.notify_peers(tag).await;
        Ok(count)
    }

    /// Invalidate every currently-tracked key matching a glob `pattern`.
    pub async fn invalidate_pattern(&self, pattern: &str, known_keys: &[String]) -> Result<usize> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| crate::error::Error::Internal(format!("invalid pattern: {e}")))?;
        let mut count = 0;
        for key in known_keys {
            if matcher.matches(key) {
                self.cache.delete(key).await?;
                self.record(key, InvalidationReason::PatternMatch);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Walk the dependency graph breadth-first up to `cascade_depth`
    /// levels, invalidating every transitive dependent. Cycle-safe via a
    /// visited set.
    async fn cascade(&self, root: &str, depth: usize) -> Result<()> {
        if depth >= self.config.cascade_depth {
            return Ok(());
        }
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(root.to_string());
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((root.to_string(), depth));

        while let Some((current, level)) = queue.pop_front() {
            if level >= self.config.cascade_depth {
                continue;
            }
            let children: Vec<String> = self.dependents.read().get(&current).map(|s| s.iter().cloned().collect()).unwrap_or_default();
            for child in children {
                if !visited.insert(child.clone()) {
                    continue;
                }
                self.cache.delete(&child).await?;
                self.record(&child, InvalidationReason::CascadeDependency);
                queue.push_back((child, level + 1));
            }
        }
        Ok(())
    }

    async fn notify_peers(&self, key: &str) {
        if let Some(peer) = &self.peer_channel {
            if let Err(e) = peer.publish(&self.config.event_channel, key).await {
                warn!(key, error = %e, "peer invalidation fan-out failed");
            }
        }
    }

    fn record(&self, key: &str, reason: InvalidationReason) {
        let mut history = self.history.write();
        history.push_back(InvalidationEvent { key: key.to_string(), reason, at: Utc::now() });
        while history.len() > self.config.max_history_size {
            history.pop_front();
        }
    }

    pub fn history(&self) -> Vec<InvalidationEvent> {
        self.history.read().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::clock::ClockRef;
    use crate::config::CacheConfig;
    use crate::domain::ports::{InMemoryKeyValueStore, InMemoryStructuredStore};
    use crate::cache::manager::SetOptions;

    fn make_manager() -> InvalidationManager {
        let clock: ClockRef = Arc::new(ManualClock::new(Utc::now()));
        let cache = Arc::new(MultiLevelCache::new(
            clock,
            CacheConfig::default(),
            Some(Arc::new(InMemoryKeyValueStore::new())),
            Some(Arc::new(InMemoryStructuredStore::new())),
            false,
        ));
        InvalidationManager::new(cache, InvalidationConfig::default(), None)
    }

    #[tokio::test]
    async fn cascades_through_declared_dependencies() {
        let manager = make_manager();
        manager.cache.set("parent", b"p".to_vec(), SetOptions::default()).await.unwrap();
        manager.cache.set("child", b"c".to_vec(), SetOptions::default()).await.unwrap();
        manager.declare_dependency("parent", "child");

        manager.invalidate_key("parent", InvalidationReason::Manual).await.unwrap();

        assert_eq!(manager.cache.get("parent").await.unwrap(), None);
        assert_eq!(manager.cache.get("child").await.unwrap(), None);
        assert_eq!(manager.history().len(), 2);
    }

    #[tokio::test]
    async fn cascade_is_cycle_safe() {
        let manager = make_manager();
        manager.declare_dependency("a", "b");
        manager.declare_dependency("b", "a");
        manager.cache.set("a", b"1".to_vec(), SetOptions::default()).await.unwrap();
        manager.cache.set("b", b"2".to_vec(), SetOptions::default()).await.unwrap();

        manager.invalidate_key("a", InvalidationReason::Manual).await.unwrap();
        // Should terminate rather than looping a <-> b forever.
        assert_eq!(manager.cache.get("b").await.unwrap(), None);
    }
}
