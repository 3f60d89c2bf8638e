//! Monotonic clock abstraction.
//!
//! The controller never stores a clock. Callers pass one into
//! [`delay_us`](crate::WriteController::delay_us), which consults it only
//! when the bucket balance cannot cover a request — uncontended writes pay
//! no clock-read cost. Tests substitute [`ManualClock`] to drive time
//! deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A source of monotonically non-decreasing microsecond timestamps.
///
/// The epoch is arbitrary; only differences between readings matter.
pub trait Clock {
    /// Returns the current time in microseconds.
    fn now_us(&self) -> u64;
}

/// Production clock backed by [`Instant`].
///
/// Timestamps count microseconds since the clock was created, so two
/// `MonotonicClock` instances do not share an epoch. Use one clock per
/// engine instance.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose epoch is the moment of construction.
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
    fn now_us(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

/// Manually advanced clock for deterministic tests and simulation.
///
/// Readings never advance on their own; call [`advance`](Self::advance) or
/// [`set`](Self::set). The counter is atomic, so a shared `ManualClock` can
/// be read from writer threads while a test harness moves time forward.
#[derive(Debug)]
pub struct ManualClock {
    now_us: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `start_us`.
    #[must_use]
    pub const fn new(start_us: u64) -> Self {
        Self {
            now_us: AtomicU64::new(start_us),
        }
    }

    /// Moves the clock forward by `delta_us`.
    pub fn advance(&self, delta_us: u64) {
        self.now_us.fetch_add(delta_us, Ordering::Relaxed);
    }

    /// Sets the clock to an absolute reading.
    pub fn set(&self, now_us: u64) {
        self.now_us.store(now_us, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::Relaxed)
    }
}
