//! Time sources.
//!
//! Status rows are ordered by `created_at`, so two rows written for the same appointment must
//! never share a timestamp. [`SystemClock`] therefore hands out strictly increasing instants,
//! bumping by one microsecond whenever the wall clock has not moved on since the last call.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, strictly increasing across calls on the same instance.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        let timestamp = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(timestamp);
        timestamp
    }
}

/// A hand-driven clock for tests.
///
/// Every call to [`Clock::now`] returns the current instant and then advances it by `tick`,
/// so successive reads are still strictly increasing.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
    tick: Duration,
}

impl ManualClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
            tick: Duration::seconds(1),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Moves the clock forward without reading it.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += by;
    }

    /// Returns the instant the next `now()` will hand out.
    pub fn peek(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let now = *current;
        *current += self.tick;
        now
    }
}
