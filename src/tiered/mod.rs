//! Tiered Storage Engine: the top-level orchestrator for
//! placement, read-through across tiers, promotion on hit, periodic
//! demotion, and retention sweeps.

mod engine;
mod placement;
mod scheduler;

pub use engine::{MigrationResult, StoreOptions, TierCount, TierStatistics, TieredStorageEngine};
pub use placement::determine_target_tier;
pub use scheduler::MigrationScheduler;
