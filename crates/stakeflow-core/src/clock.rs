//! Time sources for the execution context
//!
//! Pools never read time themselves: the serialized caller asks a [`Clock`]
//! for `now` and passes it into every operation. [`ManualClock`] lets tests
//! and simulations drive time deterministically.

use crate::types::Timestamp;
use parking_lot::Mutex;
use std::sync::Arc;

/// A non-decreasing source of Unix seconds
pub trait Clock {
    /// Current time in seconds
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp().max(0) as Timestamp
    }
}

/// Manually advanced clock
///
/// Clones share the same underlying time, so a test can hand one clone to
/// the code under test and advance another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    time: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    /// Create a clock starting at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            time: Arc::new(Mutex::new(start)),
        }
    }

    /// Move time forward by `secs` and return the new time
    pub fn advance(&self, secs: u64) -> Timestamp {
        let mut time = self.time.lock();
        *time = time.saturating_add(secs);
        *time
    }

    /// Jump to `target`; earlier targets are ignored so time never runs backwards
    pub fn set(&self, target: Timestamp) -> Timestamp {
        let mut time = self.time.lock();
        *time = (*time).max(target);
        *time
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.time.lock()
    }
}
