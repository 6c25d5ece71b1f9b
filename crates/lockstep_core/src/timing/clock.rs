//! Time sources for the frame predictor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A monotonic microsecond time source.
pub trait Clock: Send + Sync {
    /// Returns the current time in microseconds.
    ///
    /// Values never decrease.
    fn now_micros(&self) -> u64;
}

/// Clock backed by [`Instant`], counting from the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose zero is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_micros(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

/// Clock that only moves when told to.
///
/// Used to make frame-time predictions deterministic.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `start_micros`.
    #[must_use]
    pub fn new(start_micros: u64) -> Self {
        Self {
            now: AtomicU64::new(start_micros),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, micros: u64) {
        self.now.fetch_add(micros, Ordering::AcqRel);
    }

    /// Sets the clock to an absolute reading.
    pub fn set(&self, micros: u64) {
        self.now.store(micros, Ordering::Release);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_micros(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}
