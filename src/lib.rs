//! Tiered storage and multi-level cache data plane.
//!
//! Classifies application data into four access tiers — HOT, WARM, COLD,
//! BACKUP — and transparently routes reads, writes, evictions,
//! invalidations, and lifecycle-driven migrations across them. A
//! companion in-process cache hierarchy (L1/L2/L3) sits alongside the
//! tier manager with policy-driven eviction, tag/dependency invalidation,
//! and predictive warming.
//!
//! # Modules
//!
//! - [`domain`]: the shared data model (tiers, data items, metadata,
//!   access patterns, retention policies) and the adapter ports
//!   (`KeyValueAdapter`, `StructuredStoreAdapter`, `ObjectStoreAdapter`)
//!   through which the core talks to external stores.
//! - [`tiered`]: the Tiered Storage Engine — placement, promotion on
//!   hit, scheduled demotion, and retention sweeps.
//! - [`lifecycle`]: the Access-Pattern Tracker that backs migration
//!   candidate selection.
//! - [`retention`]: the Retention Policy Engine.
//! - [`cache`]: the Multi-Level Cache, its eviction policies, the
//!   Invalidation Manager, and the Cache Warmer.
//! - [`config`]: plain-struct configuration for every component.
//! - [`clock`]: the injectable time source used throughout so tests can
//!   pin wall-clock time deterministically.
//! - [`compression`]: the COLD/BACKUP adapter-level compression support.
//! - [`error`]: the crate-wide error taxonomy.

pub mod cache;
pub mod clock;
pub mod compression;
pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod retention;
pub mod tiered;

pub use clock::{Clock, ClockRef, SystemClock};
pub use config::{
    BackupConfig, CacheConfig, ColdConfig, HotConfig, InvalidationConfig, MigrationConfig,
    TieredStorageConfig, WarmConfig, WarmingConfig, WarmingStrategy,
};
pub use domain::model::{
    AccessEvent, AccessPattern, DataType, MetadataRow, MigrationLogEntry, PolicyViolation,
    RetentionPolicy, Severity, Tier, Trend, ViolationType,
};
pub use domain::ports::{
    InMemoryKeyValueStore, InMemoryObjectStore, InMemoryStructuredStore, KeyValueAdapter,
    KeyValueAdapterRef, ObjectStoreAdapter, ObjectStoreAdapterRef, StructuredStoreAdapter,
    StructuredStoreAdapterRef,
};
pub use error::{Error, ErrorAction, Result};
pub use lifecycle::AccessPatternTracker;
pub use retention::RetentionPolicyEngine;
pub use tiered::{MigrationScheduler, StoreOptions, TieredStorageEngine};

/// Library version, as reported by the binary and the `/stats` endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
