//! Cache event pub-sub: typed broadcast so callers can observe
//! cache activity without polling (metrics, invalidation fan-out, tests).

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    Set,
    Get,
    Delete,
    Invalidate,
    Evict,
}

#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub kind: CacheEventKind,
    pub key: String,
    pub layer: super::metrics::CacheLayer,
    pub hit: bool,
    pub at: DateTime<Utc>,
}

impl CacheEvent {
    pub fn new(kind: CacheEventKind, key: impl Into<String>, layer: super::metrics::CacheLayer, hit: bool, at: DateTime<Utc>) -> Self {
        Self { kind, key: key.into(), layer, hit, at }
    }
}

/// Default channel capacity for the event broadcast. Slow subscribers fall
/// behind and receive `RecvError::Lagged` rather than block publishers.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
