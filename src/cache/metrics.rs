//! Cache Analytics: per-layer hit/miss counters, hit rate, an EWMA
//! of read latency, and a bounded most-accessed-keys view.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLayer {
    L1,
    L2,
    L3,
}

impl CacheLayer {
    pub const ALL: [CacheLayer; 3] = [CacheLayer::L1, CacheLayer::L2, CacheLayer::L3];
}

#[derive(Debug, Default)]
struct LayerCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// EWMA smoothing factor for latency tracking.
const LATENCY_EWMA_ALPHA: f64 = 0.2;

pub struct CacheAnalytics {
    layers: HashMap<CacheLayer, LayerCounters>,
    avg_latency_micros: parking_lot::RwLock<f64>,
    key_access_counts: parking_lot::RwLock<HashMap<String, u64>>,
    max_tracked_keys: usize,
}

impl std::fmt::Debug for CacheAnalytics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAnalytics").field("max_tracked_keys", &self.max_tracked_keys).finish()
    }
}

impl CacheAnalytics {
    pub fn new(max_tracked_keys: usize) -> Self {
        let mut layers = HashMap::new();
        for layer in CacheLayer::ALL {
            layers.insert(layer, LayerCounters::default());
        }
        Self {
            layers,
            avg_latency_micros: parking_lot::RwLock::new(0.0),
            key_access_counts: parking_lot::RwLock::new(HashMap::new()),
            max_tracked_keys,
        }
    }

    pub fn record_hit(&self, layer: CacheLayer, key: &str, latency: Duration) {
        if let Some(c) = self.layers.get(&layer) {
            c.hits.fetch_add(1, Ordering::Relaxed);
        }
        self.record_latency(latency);
        self.bump_key(key);
    }

    pub fn record_miss(&self, layer: CacheLayer, latency: Duration) {
        if let Some(c) = self.layers.get(&layer) {
            c.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.record_latency(latency);
    }

    fn record_latency(&self, latency: Duration) {
        let sample = latency.as_micros() as f64;
        let mut avg = self.avg_latency_micros.write();
        *avg = if *avg == 0.0 { sample } else { LATENCY_EWMA_ALPHA * sample + (1.0 - LATENCY_EWMA_ALPHA) * *avg };
    }

    fn bump_key(&self, key: &str) {
        let mut counts = self.key_access_counts.write();
        if let Some(c) = counts.get_mut(key) {
            *c += 1;
            return;
        }
        if counts.len() >= self.max_tracked_keys {
            if let Some(min_key) = counts.iter().min_by_key(|(_, v)| **v).map(|(k, _)| k.clone()) {
                counts.remove(&min_key);
            }
        }
        counts.insert(key.to_string(), 1);
    }

    pub fn layer_hits(&self, layer: CacheLayer) -> u64 {
        self.layers.get(&layer).map(|c| c.hits.load(Ordering::Relaxed)).unwrap_or(0)
    }

    pub fn layer_misses(&self, layer: CacheLayer) -> u64 {
        self.layers.get(&layer).map(|c| c.misses.load(Ordering::Relaxed)).unwrap_or(0)
    }

    pub fn total_requests(&self) -> u64 {
        CacheLayer::ALL.iter().map(|l| self.layer_hits(*l) + self.layer_misses(*l)).sum()
    }

    pub fn total_hits(&self) -> u64 {
        CacheLayer::ALL.iter().map(|l| self.layer_hits(*l)).sum()
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.total_hits() as f64 / total as f64
    }

    pub fn avg_latency(&self) -> Duration {
        Duration::from_micros(*self.avg_latency_micros.read() as u64)
    }

    pub fn top_keys(&self, n: usize) -> Vec<(String, u64)> {
        let counts = self.key_access_counts.read();
        let mut entries: Vec<_> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(n);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_reflects_recorded_hits_and_misses() {
        let analytics = CacheAnalytics::new(100);
        analytics.record_hit(CacheLayer::L1, "a", Duration::from_micros(10));
        analytics.record_miss(CacheLayer::L1, Duration::from_micros(20));
        assert_eq!(analytics.total_requests(), 2);
        assert!((analytics.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn top_keys_evicts_least_accessed_beyond_capacity() {
        let analytics = CacheAnalytics::new(2);
        analytics.record_hit(CacheLayer::L1, "a", Duration::from_micros(1));
        analytics.record_hit(CacheLayer::L1, "a", Duration::from_micros(1));
        analytics.record_hit(CacheLayer::L1, "b", Duration::from_micros(1));
        analytics.record_hit(CacheLayer::L1, "c", Duration::from_micros(1));
        let top = analytics.top_keys(10);
        assert!(top.iter().any(|(k, _)| k == "a"));
        assert_eq!(top.len(), 2);
    }
}
