//! Configuration surface. Configuration-file parsing is explicitly
//! out of scope, so every option here is a plain struct with a `Default`
//! impl and `with_*` builder methods. The binary assembles these from
//! CLI flags and environment variables; tests construct them directly.

use std::time::Duration;

/// HOT tier configuration.
#[derive(Debug, Clone)]
pub struct HotConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub max_items: usize,
}

impl Default for HotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 3600,
            max_items: 100_000,
        }
    }
}

/// WARM tier configuration.
#[derive(Debug, Clone)]
pub struct WarmConfig {
    pub enabled: bool,
    pub retention_days: u32,
}

impl Default for WarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 90,
        }
    }
}

/// COLD tier configuration.
#[derive(Debug, Clone)]
pub struct ColdConfig {
    pub enabled: bool,
    pub retention_days: u32,
    pub compression_enabled: bool,
    pub use_object_store: bool,
}

impl Default for ColdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 365,
            compression_enabled: true,
            use_object_store: false,
        }
    }
}

/// BACKUP tier configuration.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub enabled: bool,
    pub retention_days: u32,
    /// Minimal interval-only schedule, e.g. `*/60 * * * *`. See
    /// [`crate::cache::warmer::schedule::parse_interval_cron`].
    pub schedule_cron: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 2555,
            schedule_cron: "*/1440 * * * *".to_string(),
        }
    }
}

/// Migration scheduler configuration.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub batch_size: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 15,
            batch_size: 100,
        }
    }
}

impl MigrationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// Aggregate configuration for the [`crate::tiered::TieredStorageEngine`].
#[derive(Debug, Clone, Default)]
pub struct TieredStorageConfig {
    pub hot: HotConfig,
    pub warm: WarmConfig,
    pub cold: ColdConfig,
    pub backup: BackupConfig,
    pub migration: MigrationConfig,
}

impl TieredStorageConfig {
    pub fn with_hot(mut self, hot: HotConfig) -> Self {
        self.hot = hot;
        self
    }
    pub fn with_migration(mut self, migration: MigrationConfig) -> Self {
        self.migration = migration;
        self
    }
}

/// Multi-Level Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub l1_max_size: usize,
    pub l1_ttl: Duration,
    pub l2_ttl: Duration,
    pub l3_ttl: Duration,
    pub predictive_enabled: bool,
    pub distributed_coord_enabled: bool,
    pub coord_channel: String,
    pub analytics_enabled: bool,
    pub analytics_retention: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_max_size: 1000,
            l1_ttl: Duration::from_secs(300),
            l2_ttl: Duration::from_secs(3600),
            l3_ttl: Duration::from_secs(86_400),
            predictive_enabled: true,
            distributed_coord_enabled: false,
            coord_channel: "cache_invalidation".to_string(),
            analytics_enabled: true,
            analytics_retention: Duration::from_secs(86_400),
        }
    }
}

impl CacheConfig {
    pub fn with_l1_max_size(mut self, size: usize) -> Self {
        self.l1_max_size = size;
        self
    }
}

/// Cache Invalidation Manager configuration.
#[derive(Debug, Clone)]
pub struct InvalidationConfig {
    pub default_ttl: Duration,
    pub sliding_ttl: bool,
    pub event_channel: String,
    pub cascade_depth: usize,
    pub max_history_size: usize,
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            sliding_ttl: false,
            event_channel: "cache_invalidation".to_string(),
            cascade_depth: 5,
            max_history_size: 1000,
        }
    }
}

/// Cache Warmer configuration.
#[derive(Debug, Clone)]
pub struct WarmingConfig {
    pub strategy: WarmingStrategy,
    pub batch_size: usize,
    pub delay_between_batches: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub parallelism: usize,
    pub predictive_enabled: bool,
    pub predictive_threshold: f64,
    pub access_pattern_window: usize,
    pub max_predictive_keys: usize,
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            strategy: WarmingStrategy::Manual,
            batch_size: 50,
            delay_between_batches: Duration::from_millis(100),
            max_retries: 3,
            retry_delay: Duration::from_millis(200),
            timeout: Duration::from_secs(5),
            parallelism: 4,
            predictive_enabled: true,
            predictive_threshold: 0.7,
            access_pattern_window: 100,
            max_predictive_keys: 20,
        }
    }
}

/// Warm-up trigger strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmingStrategy {
    OnStartup,
    Scheduled,
    Predictive,
    Manual,
}
