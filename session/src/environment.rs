//! Injectable dependencies.

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Codecs stamp encoded values with it and compare against it when
/// enforcing their max age.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
