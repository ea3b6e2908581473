//! Deterministic clock for testing.

use crate::environment::Clock;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle and pass
/// another to a codec.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use lease_sessions::environment::Clock;
/// use lease_sessions::mocks::FixedClock;
///
/// let clock = FixedClock::new(Utc::now());
/// let before = clock.now();
/// clock.advance(Duration::seconds(30));
/// assert_eq!(clock.now() - before, Duration::seconds(30));
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    secs: Arc<AtomicI64>,
}

impl FixedClock {
    /// Create a clock frozen at `time` (second precision).
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            secs: Arc::new(AtomicI64::new(time.timestamp())),
        }
    }

    /// Move the clock forward (or backward, for negative durations).
    pub fn advance(&self, by: Duration) {
        self.secs.fetch_add(by.num_seconds(), Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, time: DateTime<Utc>) {
        self.secs.store(time.timestamp(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.secs.load(Ordering::SeqCst), 0)
            .single()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_is_stable() {
        let clock = FixedClock::new(Utc::now());
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_clones_share_time() {
        let clock = FixedClock::new(Utc::now());
        let handle = clock.clone();
        let start = clock.now();

        handle.advance(Duration::hours(1));

        assert_eq!(clock.now() - start, Duration::hours(1));
    }
}
