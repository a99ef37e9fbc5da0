//! L1 eviction policies. Each policy is a pure selection function
//! over the live entry set rather than an auxiliary ordered structure, so
//! hot-swapping policies has nothing to migrate.

use super::entry::L1Entry;
use std::collections::HashMap;

pub trait EvictionPolicy: Send + Sync + std::fmt::Debug {
    /// The key to evict among `entries`, or `None` if empty.
    fn select_victim(&self, entries: &HashMap<String, L1Entry>) -> Option<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LruPolicy;

impl EvictionPolicy for LruPolicy {
    fn select_victim(&self, entries: &HashMap<String, L1Entry>) -> Option<String> {
        entries.values().min_by_key(|e| e.accessed_at).map(|e| e.key.clone())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LfuPolicy;

impl EvictionPolicy for LfuPolicy {
    fn select_victim(&self, entries: &HashMap<String, L1Entry>) -> Option<String> {
        entries
            .values()
            .min_by(|a, b| a.access_count.cmp(&b.access_count).then(a.accessed_at.cmp(&b.accessed_at)))
            .map(|e| e.key.clone())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FifoPolicy;

impl EvictionPolicy for FifoPolicy {
    fn select_victim(&self, entries: &HashMap<String, L1Entry>) -> Option<String> {
        entries.values().min_by_key(|e| e.created_at).map(|e| e.key.clone())
    }
}

/// Evicts among the lowest-`priority` entries, breaking ties with a
/// configurable fallback. Defaults the fallback to LRU.
#[derive(Debug)]
pub struct PriorityPolicy {
    pub fallback: Box<dyn EvictionPolicy>,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self { fallback: Box::new(LruPolicy) }
    }
}

impl EvictionPolicy for PriorityPolicy {
    fn select_victim(&self, entries: &HashMap<String, L1Entry>) -> Option<String> {
        let min_priority = entries.values().map(|e| e.priority).min()?;
        let subset: HashMap<String, L1Entry> = entries
            .iter()
            .filter(|(_, e)| e.priority == min_priority)
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();
        self.fallback.select_victim(&subset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn entry_at(key: &str, accessed_secs_ago: i64, created_secs_ago: i64, access_count: u64, priority: i32) -> L1Entry {
        let now = Utc::now();
        L1Entry {
            key: key.to_string(),
            value: vec![],
            first_created_at: now - chrono::Duration::seconds(created_secs_ago),
            created_at: now - chrono::Duration::seconds(created_secs_ago),
            accessed_at: now - chrono::Duration::seconds(accessed_secs_ago),
            access_count,
            ttl: Duration::from_secs(300),
            tags: BTreeSet::new(),
            priority,
        }
    }

    #[test]
    fn lru_evicts_least_recently_accessed() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), entry_at("a", 100, 100, 1, 0));
        map.insert("b".to_string(), entry_at("b", 1, 1, 1, 0));
        assert_eq!(LruPolicy.select_victim(&map), Some("a".to_string()));
    }

    #[test]
    fn lfu_breaks_ties_by_oldest_access() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), entry_at("a", 50, 50, 2, 0));
        map.insert("b".to_string(), entry_at("b", 10, 10, 2, 0));
        assert_eq!(LfuPolicy.select_victim(&map), Some("a".to_string()));
    }

    #[test]
    fn fifo_ignores_access_recency() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), entry_at("a", 1, 100, 99, 0));
        map.insert("b".to_string(), entry_at("b", 100, 1, 1, 0));
        assert_eq!(FifoPolicy.select_victim(&map), Some("a".to_string()));
    }

    #[test]
    fn priority_defers_to_lru_fallback_among_lowest_priority() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), entry_at("a", 100, 100, 1, 1));
        map.insert("b".to_string(), entry_at("b", 1, 1, 1, 0));
        map.insert("c".to_string(), entry_at("c", 50, 50, 1, 0));
        let policy = PriorityPolicy::default();
        assert_eq!(policy.select_victim(&map), Some("c".to_string()));
    }
}
