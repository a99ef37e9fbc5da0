//! The Tiered Storage Engine: the single entry point for tiered
//! reads and writes. Orchestrates placement, promotion-on-hit, scheduled
//! demotion, and retention enforcement across the four tiers.

use super::placement::determine_target_tier;
use crate::clock::ClockRef;
use crate::compression::{CompressionAlgorithm, CompressionManager};
use crate::config::TieredStorageConfig;
use crate::domain::model::{DataType, MetadataRow, MigrationLogEntry, Tier};
use crate::domain::ports::{
    KeyValueAdapterRef, ObjectDownloadOptions, ObjectStoreAdapterRef, ObjectUploadOptions,
    StructuredStoreAdapterRef,
};
use crate::error::{Error, Result};
use crate::lifecycle::AccessPatternTracker;
use crate::retention::{EnforcementReport, PolicyEnforcementTarget, RetentionPolicyEngine};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const WARM_TABLE: &str = "tiered_storage_warm";
const COLD_TABLE: &str = "tiered_storage_cold";
const BACKUP_TABLE: &str = "tiered_storage_backup";

fn hot_key(key: &str) -> String {
    format!("tier:hot:{key}")
}

fn ttl_for(data_type: DataType) -> Duration {
    Duration::from_secs(data_type.default_ttl_seconds())
}

fn algo_tag(algo: CompressionAlgorithm) -> u8 {
    match algo {
        CompressionAlgorithm::None => 0,
        CompressionAlgorithm::Lz4 => 1,
        CompressionAlgorithm::Zstd => 2,
        CompressionAlgorithm::Snappy => 3,
    }
}

fn tag_algo(tag: u8) -> CompressionAlgorithm {
    match tag {
        1 => CompressionAlgorithm::Lz4,
        2 => CompressionAlgorithm::Zstd,
        3 => CompressionAlgorithm::Snappy,
        _ => CompressionAlgorithm::None,
    }
}

/// Optional per-call overrides for [`TieredStorageEngine::store`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub tier: Option<Tier>,
    pub ttl: Option<Duration>,
    pub tags: BTreeSet<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of one [`TieredStorageEngine::perform_migration`] pass.
#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    pub migrated: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TierCount {
    pub items: usize,
    pub bytes: u64,
}

/// Snapshot returned by [`TieredStorageEngine::get_statistics`].
#[derive(Debug, Clone, Default)]
pub struct TierStatistics {
    pub per_tier: HashMap<Tier, TierCount>,
    pub migrations_total: usize,
    pub migrations_succeeded: usize,
}

/// Top-level orchestrator for tiered reads and writes. `warm`/`cold`/`backup` are
/// optional: an absent adapter makes that tier transparently unavailable
/// (reads skip it, writes to it fail with `AdapterUnavailable`).
pub struct TieredStorageEngine {
    clock: ClockRef,
    config: TieredStorageConfig,
    hot: KeyValueAdapterRef,
    warm: Option<StructuredStoreAdapterRef>,
    cold: Option<StructuredStoreAdapterRef>,
    cold_objects: Option<ObjectStoreAdapterRef>,
    backup: Option<StructuredStoreAdapterRef>,
    compression: CompressionManager,
    metadata: RwLock<HashMap<String, MetadataRow>>,
    migration_log: RwLock<Vec<MigrationLogEntry>>,
    next_seq: AtomicU64,
    in_flight: RwLock<HashSet<String>>,
    tracker: Arc<AccessPatternTracker>,
    retention: Arc<RetentionPolicyEngine>,
}

impl TieredStorageEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: TieredStorageConfig,
        clock: ClockRef,
        hot: KeyValueAdapterRef,
        warm: Option<StructuredStoreAdapterRef>,
        cold: Option<StructuredStoreAdapterRef>,
        cold_objects: Option<ObjectStoreAdapterRef>,
        backup: Option<StructuredStoreAdapterRef>,
        tracker: Arc<AccessPatternTracker>,
        retention: Arc<RetentionPolicyEngine>,
    ) -> Self {
        Self {
            clock,
            config,
            hot,
            warm,
            cold,
            cold_objects,
            backup,
            compression: CompressionManager::new(),
            metadata: RwLock::new(HashMap::new()),
            migration_log: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(1),
            in_flight: RwLock::new(HashSet::new()),
            tracker,
            retention,
        }
    }

    pub fn metadata_of(&self, key: &str) -> Option<MetadataRow> {
        self.metadata.read().get(key).cloned()
    }

    pub fn migration_log(&self) -> Vec<MigrationLogEntry> {
        self.migration_log.read().clone()
    }

    pub fn retention_engine(&self) -> &Arc<RetentionPolicyEngine> {
        &self.retention
    }

    pub fn tracker(&self) -> &Arc<AccessPatternTracker> {
        &self.tracker
    }

    /// Persist `value` and its metadata, then return once the target
    /// tier's adapter has acked. Surfaces the first adapter error.
    pub async fn store(
        &self,
        key: &str,
        value: Vec<u8>,
        data_type: DataType,
        opts: StoreOptions,
    ) -> Result<()> {
        let now = self.clock.now();
        let tier = opts.tier.unwrap_or_else(|| data_type.default_tier());
        self.write_tier(tier, key, data_type, &value, opts.ttl).await?;

        let existed = {
            let mut guard = self.metadata.write();
            let existed = guard.contains_key(key);
            match guard.get_mut(key) {
                Some(row) => {
                    row.tier = tier;
                    row.data_type = data_type;
                    row.size = value.len() as u64;
                    row.tags = opts.tags.clone();
                    row.expires_at = opts.expires_at;
                    row.updated_at = now;
                }
                None => {
                    guard.insert(
                        key.to_string(),
                        MetadataRow::new(key, data_type, tier, now, value.len() as u64, opts.tags, opts.expires_at),
                    );
                }
            }
            existed
        };

        if !existed {
            self.tracker.track(key, data_type);
        }
        Ok(())
    }

    /// Probe HOT, WARM, COLD, BACKUP in order; first hit returns. Adapter
    /// read failures are treated as a miss on that tier; the aggregated
    /// error only surfaces when every tier errored.
    pub async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut error_count = 0usize;
        let mut last_err: Option<Error> = None;

        for tier in Tier::ORDER {
            match self.read_tier(tier, key).await {
                Ok(Some(value)) => {
                    self.on_hit(key, tier).await;
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(%key, ?tier, error = %e, "tier read failed, trying next tier");
                    error_count += 1;
                    last_err = Some(e);
                }
            }
        }

        if error_count == Tier::ORDER.len() {
            Err(last_err.expect("error_count > 0 implies last_err is set"))
        } else {
            Ok(None)
        }
    }

    /// Delete from every tier (idempotent per tier) and from metadata.
    pub async fn delete(&self, key: &str) -> Result<()> {
        for tier in Tier::ORDER {
            if let Err(e) = self.delete_tier(tier, key).await {
                warn!(%key, ?tier, error = %e, "delete failed for tier");
            }
        }
        self.metadata.write().remove(key);
        self.tracker.remove(key);
        Ok(())
    }

    /// One pass over up to `migration.batch_size` candidates nominated by
    /// the Access-Pattern Tracker.
    pub async fn perform_migration(&self) -> MigrationResult {
        let started = self.clock.monotonic_now();
        let candidates = self.tracker.migration_candidates(self.config.migration.batch_size);

        let mut migrated = 0;
        let mut failed = 0;
        let mut errors = Vec::new();

        for key in candidates {
            let row = { self.metadata.read().get(&key).cloned() };
            let Some(row) = row else { continue };
            let now = self.clock.now();
            let target = determine_target_tier(&row, now);
            if target == row.tier {
                continue;
            }
            match self.migrate_key(&key, row.tier, target, "scheduled_demotion").await {
                Ok(()) => migrated += 1,
                Err(e) => {
                    failed += 1;
                    errors.push(format!("{key}: {e}"));
                }
            }
        }

        MigrationResult {
            migrated,
            failed,
            errors,
            duration: self.clock.monotonic_now().duration_since(started),
        }
    }

    pub async fn enforce_retention_policies(&self) -> Result<EnforcementReport> {
        self.retention.enforce_all(self).await
    }

    pub fn get_statistics(&self) -> TierStatistics {
        let guard = self.metadata.read();
        let mut per_tier: HashMap<Tier, TierCount> = HashMap::new();
        for row in guard.values() {
            let entry = per_tier.entry(row.tier).or_default();
            entry.items += 1;
            entry.bytes += row.size;
        }
        drop(guard);

        let log = self.migration_log.read();
        TierStatistics {
            per_tier,
            migrations_total: log.len(),
            migrations_succeeded: log.iter().filter(|e| e.success).count(),
        }
    }

    async fn on_hit(&self, key: &str, physical_tier: Tier) {
        let now = self.clock.now();
        let canonical = {
            let mut guard = self.metadata.write();
            match guard.get_mut(key) {
                Some(row) => {
                    row.last_accessed_at = now;
                    row.access_count += 1;
                    row.updated_at = now;
                    row.tier
                }
                None => {
                    let row = MetadataRow::new(
                        key,
                        DataType::Configuration,
                        physical_tier,
                        now,
                        0,
                        BTreeSet::new(),
                        None,
                    );
                    let tier = row.tier;
                    guard.insert(key.to_string(), row);
                    tier
                }
            }
        };

        self.tracker.record_access(key, physical_tier);

        if physical_tier != canonical {
            // Residual copy left behind by a migration whose source
            // delete failed; metadata.tier is authoritative, so drop the
            // stale physical copy instead of trusting this probe.
            if let Err(e) = self.delete_tier(physical_tier, key).await {
                warn!(%key, ?physical_tier, error = %e, "reconciliation delete failed");
            }
            return;
        }

        let freq = { self.metadata.read().get(key).map(|r| r.frequency(now)).unwrap_or(0.0) };
        if freq > 5.0 {
            if let Some(target) = canonical.promote() {
                if let Err(e) = self.migrate_key(key, canonical, target, "promotion").await {
                    warn!(%key, error = %e, "promotion failed");
                }
            }
        }
    }

    /// Serialises concurrent migrations of the same key: a request
    /// arriving while one is already in flight is silently dropped.
    async fn migrate_key(&self, key: &str, from: Tier, to: Tier, reason: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        {
            let mut inflight = self.in_flight.write();
            if inflight.contains(key) {
                return Ok(());
            }
            inflight.insert(key.to_string());
        }
        let result = self.migrate_key_inner(key, from, to, reason).await;
        self.in_flight.write().remove(key);
        result
    }

    async fn migrate_key_inner(&self, key: &str, from: Tier, to: Tier, reason: &str) -> Result<()> {
        let now = self.clock.now();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let data_type = { self.metadata.read().get(key).map(|r| r.data_type) };
        let Some(data_type) = data_type else {
            self.log_migration(seq, key, from, to, now, reason, false, Some("metadata missing".to_string()));
            return Err(Error::not_found(key));
        };

        let value = match self.read_tier(from, key).await {
            Ok(Some(v)) => v,
            Ok(None) => {
                self.log_migration(seq, key, from, to, now, reason, false, Some("not_found".to_string()));
                return Err(Error::not_found(key));
            }
            Err(e) => {
                self.log_migration(seq, key, from, to, now, reason, false, Some(e.to_string()));
                return Err(e);
            }
        };

        if let Err(e) = self.write_tier(to, key, data_type, &value, None).await {
            self.log_migration(seq, key, from, to, now, reason, false, Some(e.to_string()));
            return Err(e);
        }

        if let Err(e) = self.delete_tier(from, key).await {
            warn!(%key, error = %e, "migration delete of source tier failed; duplicate residency until reconciliation");
        }

        {
            let mut guard = self.metadata.write();
            if let Some(row) = guard.get_mut(key) {
                row.tier = to;
                row.updated_at = now;
            }
        }

        self.log_migration(seq, key, from, to, now, reason, true, None);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn log_migration(
        &self,
        seq: u64,
        key: &str,
        from: Tier,
        to: Tier,
        at: DateTime<Utc>,
        reason: &str,
        success: bool,
        error: Option<String>,
    ) {
        self.migration_log.write().push(MigrationLogEntry {
            seq,
            key: key.to_string(),
            from_tier: from,
            to_tier: to,
            at,
            reason: reason.to_string(),
            success,
            error,
        });
    }

    async fn write_tier(
        &self,
        tier: Tier,
        key: &str,
        data_type: DataType,
        value: &[u8],
        ttl_override: Option<Duration>,
    ) -> Result<()> {
        match tier {
            Tier::Hot => {
                let ttl = ttl_override.unwrap_or_else(|| ttl_for(data_type));
                self.hot.set(&hot_key(key), value.to_vec(), Some(ttl)).await
            }
            Tier::Warm => {
                let adapter = self
                    .warm
                    .as_ref()
                    .ok_or_else(|| Error::adapter_unavailable("warm", "not configured"))?;
                adapter.put(WARM_TABLE, key, value.to_vec()).await
            }
            Tier::Cold => self.write_cold(key, value).await,
            Tier::Backup => {
                let adapter = self
                    .backup
                    .as_ref()
                    .ok_or_else(|| Error::adapter_unavailable("backup", "not configured"))?;
                adapter.put(BACKUP_TABLE, key, value.to_vec()).await
            }
        }
    }

    async fn write_cold(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.config.cold.use_object_store {
            let adapter = self
                .cold_objects
                .as_ref()
                .ok_or_else(|| Error::adapter_unavailable("cold-object-store", "not configured"))?;
            adapter
                .upload(
                    key,
                    value.to_vec(),
                    ObjectUploadOptions {
                        compress: self.config.cold.compression_enabled,
                        ..Default::default()
                    },
                )
                .await?;
            Ok(())
        } else {
            let adapter = self
                .cold
                .as_ref()
                .ok_or_else(|| Error::adapter_unavailable("cold", "not configured"))?;
            adapter.put(COLD_TABLE, key, self.encode_cold(value)).await
        }
    }

    async fn read_tier(&self, tier: Tier, key: &str) -> Result<Option<Vec<u8>>> {
        match tier {
            Tier::Hot => self.hot.get(&hot_key(key)).await,
            Tier::Warm => match &self.warm {
                Some(a) => a.get(WARM_TABLE, key).await,
                None => Ok(None),
            },
            Tier::Cold => self.read_cold(key).await,
            Tier::Backup => match &self.backup {
                Some(a) => a.get(BACKUP_TABLE, key).await,
                None => Ok(None),
            },
        }
    }

    async fn read_cold(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.config.cold.use_object_store {
            match &self.cold_objects {
                Some(adapter) => {
                    if !adapter.exists(key).await? {
                        return Ok(None);
                    }
                    Ok(Some(adapter.download(key, ObjectDownloadOptions { decompress: true }).await?))
                }
                None => Ok(None),
            }
        } else {
            match &self.cold {
                Some(adapter) => match adapter.get(COLD_TABLE, key).await? {
                    Some(raw) => Ok(Some(self.decode_cold(&raw)?)),
                    None => Ok(None),
                },
                None => Ok(None),
            }
        }
    }

    async fn delete_tier(&self, tier: Tier, key: &str) -> Result<()> {
        match tier {
            Tier::Hot => {
                self.hot.del(&hot_key(key)).await?;
                Ok(())
            }
            Tier::Warm => {
                if let Some(a) = &self.warm {
                    a.delete(WARM_TABLE, key).await?;
                }
                Ok(())
            }
            Tier::Cold => {
                if self.config.cold.use_object_store {
                    if let Some(a) = &self.cold_objects {
                        a.delete(key).await?;
                    }
                } else if let Some(a) = &self.cold {
                    a.delete(COLD_TABLE, key).await?;
                }
                Ok(())
            }
            Tier::Backup => {
                if let Some(a) = &self.backup {
                    a.delete(BACKUP_TABLE, key).await?;
                }
                Ok(())
            }
        }
    }

    fn encode_cold(&self, value: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(value.len() + 1);
        if self.config.cold.compression_enabled {
            let (bytes, algo) = self.compression.compress(value);
            out.push(algo_tag(algo));
            out.extend_from_slice(&bytes);
        } else {
            out.push(algo_tag(CompressionAlgorithm::None));
            out.extend_from_slice(value);
        }
        out
    }

    fn decode_cold(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let (tag, rest) = raw
            .split_first()
            .ok_or_else(|| Error::Serialization { detail: "empty cold payload".to_string() })?;
        let algo = tag_algo(*tag);
        if algo == CompressionAlgorithm::None {
            Ok(rest.to_vec())
        } else {
            Ok(self.compression.decompress(rest, algo)?.to_vec())
        }
    }
}

#[async_trait]
impl PolicyEnforcementTarget for TieredStorageEngine {
    async fn items_in(&self, data_type: DataType, tier: Tier) -> Result<Vec<MetadataRow>> {
        Ok(self
            .metadata
            .read()
            .values()
            .filter(|r| r.data_type == data_type && r.tier == tier)
            .cloned()
            .collect())
    }

    async fn delete_item(&self, key: &str) -> Result<()> {
        self.delete(key).await
    }

    async fn archive_item(&self, key: &str) -> Result<()> {
        let current = { self.metadata.read().get(key).map(|r| r.tier) };
        let Some(current) = current else { return Err(Error::not_found(key)) };
        self.migrate_key(key, current, Tier::Backup, "retention_archive").await
    }

    async fn demote_item(&self, key: &str) -> Result<()> {
        let current = { self.metadata.read().get(key).map(|r| r.tier) };
        let Some(current) = current else { return Err(Error::not_found(key)) };
        let Some(target) = current.demote() else { return Ok(()) };
        self.migrate_key(key, current, target, "retention_demotion").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::ports::{InMemoryKeyValueStore, InMemoryStructuredStore};

    fn test_engine(clock: ClockRef) -> TieredStorageEngine {
        let hot = Arc::new(InMemoryKeyValueStore::new());
        let warm = Arc::new(InMemoryStructuredStore::new());
        let cold = Arc::new(InMemoryStructuredStore::new());
        let backup = Arc::new(InMemoryStructuredStore::new());
        let tracker = Arc::new(AccessPatternTracker::new(clock.clone()));
        let retention = Arc::new(RetentionPolicyEngine::new(clock.clone()));
        TieredStorageEngine::new(
            TieredStorageConfig::default(),
            clock,
            hot,
            Some(warm),
            Some(cold),
            None,
            Some(backup),
            tracker,
            retention,
        )
    }

    #[tokio::test]
    async fn store_then_retrieve_round_trips() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = test_engine(clock);
        engine
            .store("k1", b"v1".to_vec(), DataType::Configuration, StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(engine.retrieve("k1").await.unwrap(), Some(b"v1".to_vec()));
        assert_eq!(engine.metadata_of("k1").unwrap().tier, Tier::Hot);
    }

    #[tokio::test]
    async fn overwrite_keeps_latest_value_without_bumping_access_count() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = test_engine(clock);
        engine
            .store("k1", b"v1".to_vec(), DataType::Configuration, StoreOptions::default())
            .await
            .unwrap();
        engine
            .store("k1", b"v2".to_vec(), DataType::Configuration, StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(engine.retrieve("k1").await.unwrap(), Some(b"v2".to_vec()));
        // Two stores, zero reads: access_count must still read as the
        // single create, since overwriting isn't an access.
        assert_eq!(engine.metadata_of("k1").unwrap().access_count, 1);
    }

    #[tokio::test]
    async fn delete_then_retrieve_is_absent() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = test_engine(clock);
        engine
            .store("k1", b"v1".to_vec(), DataType::Configuration, StoreOptions::default())
            .await
            .unwrap();
        engine.delete("k1").await.unwrap();
        assert_eq!(engine.retrieve("k1").await.unwrap(), None);
        assert!(engine.metadata_of("k1").is_none());
    }

    #[tokio::test]
    async fn frequent_access_promotes_to_hot() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = test_engine(clock.clone());
        engine
            .store("u1", b"v".to_vec(), DataType::Conversation, StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(engine.metadata_of("u1").unwrap().tier, Tier::Warm);

        for _ in 0..6 {
            clock.advance(chrono::Duration::milliseconds(10));
            engine.retrieve("u1").await.unwrap();
        }

        assert_eq!(engine.metadata_of("u1").unwrap().tier, Tier::Hot);
    }

    #[tokio::test]
    async fn perform_migration_demotes_stale_item() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = test_engine(clock.clone());
        engine
            .store("k", b"v".to_vec(), DataType::Message, StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(engine.metadata_of("k").unwrap().tier, Tier::Warm);

        clock.advance(chrono::Duration::days(40));
        let result = engine.perform_migration().await;

        assert_eq!(result.migrated, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(engine.metadata_of("k").unwrap().tier, Tier::Cold);
        assert_eq!(engine.retrieve("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn enforce_retention_policies_archives_aged_items() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = test_engine(clock.clone());
        engine
            .store("p1", b"profile".to_vec(), DataType::UserProfile, StoreOptions::default())
            .await
            .unwrap();

        clock.advance(chrono::Duration::days(10));
        let report = engine.enforce_retention_policies().await.unwrap();

        assert_eq!(report.archived, 1);
        assert_eq!(engine.metadata_of("p1").unwrap().tier, Tier::Backup);
        assert_eq!(engine.retrieve("p1").await.unwrap(), Some(b"profile".to_vec()));
    }
}
