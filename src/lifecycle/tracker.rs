//! In-process implementation of the Access-Pattern Tracker.
//!
//! Backs `data_lifecycle_tracking` and `data_access_events` with a
//! `parking_lot::RwLock`-guarded map — a coarse lock over a map, favoring
//! simplicity over sharding since access pattern bookkeeping is not the
//! hot path.

use crate::clock::ClockRef;
use crate::domain::model::{AccessEvent, AccessPattern, DataType, Tier, Trend};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

/// Number of most-recent events considered by [`AccessPatternTracker::analyze`].
const ANALYSIS_WINDOW: usize = 100;

/// Rolling window events are retained for, independent of count.
const EVENT_RETENTION: chrono::Duration = chrono::Duration::days(7);

/// `migration_candidates` considers a key stale past this staleness.
const STALE_THRESHOLD: chrono::Duration = chrono::Duration::hours(1);

/// Per-key bookkeeping row, mirroring `data_lifecycle_tracking`.
#[derive(Debug, Clone)]
pub struct TrackedMetadata {
    pub data_type: DataType,
    pub first_access_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    pub access_count: u64,
}

struct KeyRecord {
    meta: TrackedMetadata,
    events: VecDeque<AccessEvent>,
}

/// Tracks per-key access history and derives [`AccessPattern`] summaries.
pub struct AccessPatternTracker {
    clock: ClockRef,
    records: RwLock<HashMap<String, KeyRecord>>,
}

impl AccessPatternTracker {
    pub fn new(clock: ClockRef) -> Self {
        Self {
            clock,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Upsert on create: `first_access_at = last_access_at = now`, count = 1.
    pub fn track(&self, key: &str, data_type: DataType) {
        let now = self.clock.now();
        let mut guard = self.records.write();
        guard.insert(
            key.to_string(),
            KeyRecord {
                meta: TrackedMetadata {
                    data_type,
                    first_access_at: now,
                    last_access_at: now,
                    access_count: 1,
                },
                events: VecDeque::new(),
            },
        );
    }

    /// Record a read access: bump `last_access_at`/`access_count` and
    /// append an event, pruning events past the retention window.
    pub fn record_access(&self, key: &str, tier: Tier) {
        let now = self.clock.now();
        let mut guard = self.records.write();
        let record = guard.entry(key.to_string()).or_insert_with(|| KeyRecord {
            meta: TrackedMetadata {
                data_type: DataType::Configuration,
                first_access_at: now,
                last_access_at: now,
                access_count: 0,
            },
            events: VecDeque::new(),
        });
        record.meta.last_access_at = now;
        record.meta.access_count += 1;
        record.events.push_back(AccessEvent { key: key.to_string(), tier, at: now });

        let cutoff = now - EVENT_RETENTION;
        while record.events.front().is_some_and(|e| e.at < cutoff) {
            record.events.pop_front();
        }
    }

    pub fn remove(&self, key: &str) {
        self.records.write().remove(key);
    }

    pub fn metadata(&self, key: &str) -> Option<TrackedMetadata> {
        self.records.read().get(key).map(|r| r.meta.clone())
    }

    /// Derive an [`AccessPattern`] from recorded history, or `None` if the
    /// key has never been tracked.
    pub fn analyze(&self, key: &str) -> Option<AccessPattern> {
        let guard = self.records.read();
        let record = guard.get(key)?;
        let meta = &record.meta;

        let span_ms = (meta.last_access_at - meta.first_access_at)
            .num_milliseconds()
            .max(0);
        let avg_interval_ms = span_ms / (meta.access_count.saturating_sub(1)).max(1) as i64;

        let window: Vec<&AccessEvent> = record.events.iter().rev().take(ANALYSIS_WINDOW).collect();
        let mut ordered = window;
        ordered.reverse();

        let peak_hour = peak_hour_of(&ordered);
        let trend = trend_of(&ordered);

        Some(AccessPattern {
            access_count: meta.access_count,
            avg_interval_ms,
            last_access_at: meta.last_access_at,
            peak_hour,
            trend,
        })
    }

    /// Up to `limit` keys whose `last_access_at` is older than the stale
    /// threshold, ordered ascending (staleest first).
    pub fn migration_candidates(&self, limit: usize) -> Vec<String> {
        let now = self.clock.now();
        let cutoff = now - STALE_THRESHOLD;
        let guard = self.records.read();
        let mut candidates: Vec<(DateTime<Utc>, String)> = guard
            .iter()
            .filter(|(_, r)| r.meta.last_access_at < cutoff)
            .map(|(k, r)| (r.meta.last_access_at, k.clone()))
            .collect();
        candidates.sort_by_key(|(at, _)| *at);
        candidates.truncate(limit);
        candidates.into_iter().map(|(_, k)| k).collect()
    }
}

fn peak_hour_of(events: &[&AccessEvent]) -> u32 {
    if events.is_empty() {
        return 0;
    }
    let mut counts = [0u32; 24];
    for event in events {
        let hour = event.at.format("%H").to_string().parse::<usize>().unwrap_or(0);
        counts[hour] += 1;
    }
    counts
        .iter()
        .enumerate()
        .max_by_key(|(_, c)| **c)
        .map(|(h, _)| h as u32)
        .unwrap_or(0)
}

fn trend_of(events: &[&AccessEvent]) -> Trend {
    if events.len() < 4 {
        return Trend::Stable;
    }
    let mid = events.len() / 2;
    let (first_half, second_half) = events.split_at(mid);

    let avg_gap = |slice: &[&AccessEvent]| -> f64 {
        if slice.len() < 2 {
            return 0.0;
        }
        let span = (slice.last().unwrap().at - slice.first().unwrap().at).num_milliseconds() as f64;
        span / (slice.len() - 1) as f64
    };

    let first_interval = avg_gap(first_half);
    let second_interval = avg_gap(second_half);

    if first_interval <= 0.0 {
        return Trend::Stable;
    }
    let ratio = second_interval / first_interval;
    if ratio < 0.8 {
        Trend::Increasing
    } else if ratio > 1.2 {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    #[test]
    fn track_then_analyze_yields_pattern() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tracker = AccessPatternTracker::new(clock.clone());
        tracker.track("k1", DataType::UserProfile);

        for _ in 0..5 {
            clock.advance(chrono::Duration::seconds(1));
            tracker.record_access("k1", Tier::Hot);
        }

        let pattern = tracker.analyze("k1").unwrap();
        assert_eq!(pattern.access_count, 6);
        assert!(pattern.avg_interval_ms > 0);
    }

    #[test]
    fn migration_candidates_orders_staleest_first() {
        let base = Utc::now();
        let clock = Arc::new(ManualClock::new(base));
        let tracker = AccessPatternTracker::new(clock.clone());

        tracker.track("old", DataType::Message);
        clock.advance(chrono::Duration::hours(2));
        tracker.track("newer", DataType::Message);
        clock.advance(chrono::Duration::hours(3));

        let candidates = tracker.migration_candidates(10);
        assert_eq!(candidates, vec!["old".to_string(), "newer".to_string()]);
    }

    #[test]
    fn migration_candidates_excludes_fresh_keys() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tracker = AccessPatternTracker::new(clock);
        tracker.track("fresh", DataType::Message);
        assert!(tracker.migration_candidates(10).is_empty());
    }

    #[test]
    fn remove_drops_all_state() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tracker = AccessPatternTracker::new(clock);
        tracker.track("k1", DataType::Message);
        tracker.remove("k1");
        assert!(tracker.analyze("k1").is_none());
    }
}
