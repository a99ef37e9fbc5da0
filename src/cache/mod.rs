//! The Multi-Level Cache: read-through L1 (in-process) -> L2
//! (shared key-value store) -> L3 (shared structured store), with
//! promotion on hit, write fan-out, pluggable L1 eviction, tag/dependency
//! invalidation, analytics, and predictive/scheduled warming.
//!
//! Independent of the [`crate::tiered::TieredStorageEngine`]: it can sit
//! in front of it (driven by a [`warmer::WarmSource`] backed by the
//! engine) or be used standalone.

pub mod entry;
pub mod events;
pub mod eviction;
pub mod invalidation;
pub mod manager;
pub mod metrics;
pub mod predictive;
pub mod warmer;

pub use entry::L1Entry;
pub use events::{CacheEvent, CacheEventKind};
pub use eviction::{EvictionPolicy, FifoPolicy, LfuPolicy, LruPolicy, PriorityPolicy};
pub use invalidation::{InvalidationEvent, InvalidationManager, InvalidationReason};
pub use manager::{Layers, MultiLevelCache, SetOptions};
pub use metrics::{CacheAnalytics, CacheLayer};
pub use predictive::{preload_score, IntervalTracker};
pub use warmer::{schedule::WarmUpSchedule, CacheWarmer, WarmEntry, WarmSource, WarmerStats};
