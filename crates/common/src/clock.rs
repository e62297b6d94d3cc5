//! Time sources
//!
//! The treasury never reads the system time directly. Every deadline check goes
//! through a [`Clock`], so tests can move time forward without waiting.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::types::Timestamp;

/// Get the current timestamp in seconds
pub fn timestamp_secs() -> Timestamp {
    let start = SystemTime::now();
    let since_epoch = start.duration_since(UNIX_EPOCH).unwrap_or(Duration::from_secs(0));
    since_epoch.as_secs()
}

/// A source of the current time
pub trait Clock: Send + Sync + Debug {
    /// Current time in seconds since epoch
    fn now(&self) -> Timestamp;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        timestamp_secs()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give another to the engine.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Move the clock forward, stopping at the largest representable time
    pub fn advance(&self, by: Duration) {
        let secs = by.as_secs();
        // The closure always returns Some, so the update cannot fail
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| Some(now.saturating_add(secs)));
    }

    /// Jump to an absolute time. Moving backwards is ignored.
    pub fn set(&self, to: Timestamp) {
        self.now.fetch_max(to, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Seconds in one day
pub const SECS_PER_DAY: u64 = 86_400;

/// Duration of `n` whole days, saturating at `u64::MAX` seconds
pub fn days(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(SECS_PER_DAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);

        clock.advance(days(8));
        assert_eq!(clock.now(), 1_000 + 8 * SECS_PER_DAY);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let handle = clock.clone();
        handle.advance(Duration::from_secs(30));
        assert_eq!(clock.now(), 30);
    }

    #[test]
    fn test_manual_clock_never_goes_backwards() {
        let clock = ManualClock::new(500);
        clock.set(100);
        assert_eq!(clock.now(), 500);
        clock.set(900);
        assert_eq!(clock.now(), 900);
    }

    #[test]
    fn test_manual_clock_advance_saturates() {
        let clock = ManualClock::new(100);
        clock.advance(Duration::from_secs(u64::MAX));
        assert_eq!(clock.now(), u64::MAX);

        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), u64::MAX);
    }

    #[test]
    fn test_days_saturates() {
        assert_eq!(days(2), Duration::from_secs(2 * SECS_PER_DAY));
        assert_eq!(days(300_000_000_000_000), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_system_clock_is_after_epoch() {
        assert!(SystemClock.now() > 0);
    }
}
