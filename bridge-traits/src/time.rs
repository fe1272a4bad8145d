//! Time Abstraction
//!
//! Provides an injectable time source for deterministic testing.

use chrono::{DateTime, Utc};

/// Time source trait
///
/// Abstracts system time so entity timestamps can be controlled in tests.
/// The store stamps `updated_at` from a `Clock`, and the sync engine compares
/// those stamps to detect mutations that raced an in-flight batch; tests need
/// to be able to step time explicitly to exercise that comparison.
pub trait Clock: Send + Sync {
    /// Get current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Get current Unix timestamp in milliseconds
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// System clock implementation using actual system time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock() {
        let clock = SystemClock;
        let now = clock.now();
        let millis = clock.unix_timestamp_millis();

        assert!(millis > 0);
        assert_eq!(now.timestamp_millis() / 1000, millis / 1000);
    }
}
