//! Predictive preload scoring, shared between the
//! Multi-Level Cache and the Cache Warmer so both rank candidates the
//! same way.
//!
//! score = 1 - (time_since_last / avg_interval), clamped to [0, 1].
//! A key is a warming candidate once its score crosses the configured
//! threshold (default 0.7): the longer it has been since the typical
//! next access was "due," the higher the score.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

/// Rolling window size per key: enough samples to estimate an interval
/// without unbounded memory growth.
const MAX_SAMPLES_PER_KEY: usize = 20;

pub fn preload_score(avg_interval_ms: f64, time_since_last_ms: f64) -> f64 {
    if avg_interval_ms <= 0.0 {
        return 0.0;
    }
    (1.0 - time_since_last_ms / avg_interval_ms).clamp(0.0, 1.0)
}

#[derive(Debug, Default, Clone)]
struct KeyHistory {
    timestamps: VecDeque<DateTime<Utc>>,
}

/// Tracks recent access timestamps per key to derive an average interval
/// and rank keys by predictive preload score.
#[derive(Debug, Default)]
pub struct IntervalTracker {
    history: HashMap<String, KeyHistory>,
}

impl IntervalTracker {
    pub fn new() -> Self {
        Self { history: HashMap::new() }
    }

    pub fn record(&mut self, key: &str, at: DateTime<Utc>) {
        let entry = self.history.entry(key.to_string()).or_default();
        entry.timestamps.push_back(at);
        if entry.timestamps.len() > MAX_SAMPLES_PER_KEY {
            entry.timestamps.pop_front();
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.history.remove(key);
    }

    pub fn last_access(&self, key: &str) -> Option<DateTime<Utc>> {
        self.history.get(key).and_then(|h| h.timestamps.back().copied())
    }

    /// Average milliseconds between consecutive accesses, or `None` if
    /// fewer than two samples exist.
    pub fn avg_interval_ms(&self, key: &str) -> Option<f64> {
        let timestamps = &self.history.get(key)?.timestamps;
        if timestamps.len() < 2 {
            return None;
        }
        let span = (*timestamps.back()? - *timestamps.front()?).num_milliseconds() as f64;
        Some(span / (timestamps.len() - 1) as f64)
    }

    /// Keys whose predictive score exceeds `threshold`, sorted by score
    /// descending and capped at `max`.
    pub fn candidates(&self, threshold: f64, max: usize, now: DateTime<Utc>) -> Vec<(String, f64)> {
        let mut scored: Vec<(String, f64)> = self
            .history
            .keys()
            .filter_map(|key| {
                let avg = self.avg_interval_ms(key)?;
                let last = self.last_access(key)?;
                let since = (now - last).num_milliseconds() as f64;
                let score = preload_score(avg, since);
                (score >= threshold).then_some((key.clone(), score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_spec_scenario_six_numbers() {
        // Accesses at t=0/10/20/30s -> avg interval 10_000ms.
        let avg = 10_000.0;
        assert_eq!(preload_score(avg, 40_000.0), 0.0);
        assert!((preload_score(avg, 35_000.0) - 0.5).abs() < 1e-9);
        assert!((preload_score(avg, 31_000.0) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn candidates_filters_by_threshold_and_sorts_descending() {
        let now = Utc::now();
        let mut tracker = IntervalTracker::new();
        for t in [0, 10, 20, 30] {
            tracker.record("hot", now - chrono::Duration::seconds(30 - t));
        }
        for t in [0, 10, 20, 30] {
            tracker.record("cold", now - chrono::Duration::seconds(1000 - t));
        }
        let candidates = tracker.candidates(0.7, 5, now - chrono::Duration::seconds(-1) + chrono::Duration::seconds(1));
        assert!(candidates.iter().any(|(k, _)| k == "hot"));
        assert!(!candidates.iter().any(|(k, _)| k == "cold"));
    }
}
