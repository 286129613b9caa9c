//! Monotonic time sources.
//!
//! Every timing-sensitive component takes the current `Instant` as an explicit argument
//! instead of sampling the wall clock itself. The pipeline asks a [`Clock`] once per tick
//! and threads that value through, so a whole tick observes a single point in time and
//! tests can drive the receiver with a [`ManualClock`].

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A source of monotonic timestamps.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Real monotonic clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for deterministic tests and offline replay.
///
/// Clones share the same underlying time, so a test can keep one handle to advance
/// time while the receiver owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Create a clock frozen at the moment of construction.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a clock frozen at `origin`.
    pub fn starting_at(origin: Instant) -> Self {
        Self {
            origin,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// The instant this clock started at.
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Time elapsed since [`ManualClock::origin`].
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }

    /// Move time forward by `step`.
    pub fn advance(&self, step: Duration) {
        *self.offset.lock() += step;
    }

    /// Jump to `offset` past the origin. Moving backwards is ignored.
    pub fn set_elapsed(&self, offset: Duration) {
        let mut current = self.offset.lock();
        if offset > *current {
            *current = offset;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}
