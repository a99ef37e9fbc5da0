//! L1 cache entry (`L1Entry`).

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::time::Duration;

/// A single process-local cache entry. `first_created_at` is immutable
/// and backs the sliding-TTL cap (an entry may never outlive 2x its
/// original TTL no matter how often it's refreshed).
#[derive(Debug, Clone)]
pub struct L1Entry {
    pub key: String,
    pub value: Vec<u8>,
    pub first_created_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub access_count: u64,
    pub ttl: Duration,
    pub tags: BTreeSet<String>,
    pub priority: i32,
}

impl L1Entry {
    pub fn new(
        key: impl Into<String>,
        value: Vec<u8>,
        now: DateTime<Utc>,
        ttl: Duration,
        tags: BTreeSet<String>,
        priority: i32,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            first_created_at: now,
            created_at: now,
            accessed_at: now,
            access_count: 1,
            ttl,
            tags,
            priority,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.created_at + ttl_as_chrono(self.ttl)
    }

    /// Slide the expiry forward to `now + ttl`, capped at
    /// `first_created_at + 2*ttl` (never beyond 2x the original).
    pub fn touch_sliding(&mut self, now: DateTime<Utc>) {
        let ttl = ttl_as_chrono(self.ttl);
        let max_expiry = self.first_created_at + ttl * 2;
        let desired_expiry = now + ttl;
        let new_expiry = desired_expiry.min(max_expiry);
        self.created_at = new_expiry - ttl;
    }
}

fn ttl_as_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_ttl_elapses() {
        let now = Utc::now();
        let entry = L1Entry::new("k", b"v".to_vec(), now, Duration::from_secs(10), BTreeSet::new(), 0);
        assert!(!entry.is_expired(now + chrono::Duration::seconds(5)));
        assert!(entry.is_expired(now + chrono::Duration::seconds(11)));
    }

    #[test]
    fn sliding_touch_never_exceeds_double_original_ttl() {
        let now = Utc::now();
        let ttl = Duration::from_secs(10);
        let mut entry = L1Entry::new("k", b"v".to_vec(), now, ttl, BTreeSet::new(), 0);

        entry.touch_sliding(now + chrono::Duration::seconds(8));
        assert!(!entry.is_expired(now + chrono::Duration::seconds(17)));

        // Repeated sliding touches must not push the cap past first_created_at + 2*ttl.
        for i in 0..10 {
            entry.touch_sliding(now + chrono::Duration::seconds(8 + i));
        }
        let cap = entry.first_created_at + chrono::Duration::seconds(20);
        assert!(entry.created_at + chrono::Duration::seconds(10) <= cap);
    }
}
