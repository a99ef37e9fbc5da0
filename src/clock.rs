//! Clock abstraction
//!
//! All wall-clock and monotonic timestamps in the engine flow through this
//! trait instead of calling `Utc::now()`/`Instant::now()` directly, so tests
//! can pin time and assert on exact ages, TTL expiry, and migration windows.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of wall-clock and monotonic time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Current monotonic instant, used for measuring elapsed durations
    /// (e.g. warmup latency) without exposure to wall-clock adjustments.
    fn monotonic_now(&self) -> Instant;
}

pub type ClockRef = Arc<dyn Clock>;

/// Default clock backed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}

/// Test clock pinned to a single instant until advanced explicitly.
///
/// `monotonic_now()` still advances with the wall clock so elapsed-time
/// assertions in async tests don't see a frozen duration.
pub struct ManualClock {
    now_millis: AtomicI64,
    started: Instant,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now_millis: AtomicI64::new(now.timestamp_millis()),
            started: Instant::now(),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now_millis.store(now.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, duration: chrono::Duration) {
        self.now_millis.fetch_add(duration.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.now_millis.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn monotonic_now(&self) -> Instant {
        self.started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn manual_clock_holds_until_advanced() {
        let base = Utc::now();
        let clock = ManualClock::new(base);
        assert_eq!(clock.now().timestamp_millis(), base.timestamp_millis());
        clock.advance(chrono::Duration::days(1));
        assert_eq!(
            clock.now().timestamp_millis(),
            (base + chrono::Duration::days(1)).timestamp_millis()
        );
    }

    #[test]
    fn manual_clock_set_overrides() {
        let clock = ManualClock::new(Utc::now());
        let target = Utc::now() - chrono::Duration::days(40);
        clock.set(target);
        assert_eq!(clock.now().timestamp_millis(), target.timestamp_millis());
    }
}
