//! Write admission controller.
//!
//! The [`WriteController`] is the single point through which background
//! pressure reaches foreground writers. Stress producers (flush, compaction)
//! hold RAII vote tokens; writers ask `delay_us` how long to sleep before a
//! batch. The controller never sleeps or spawns work itself — it only
//! returns durations, so callers keep control over cancellation.
//!
//! Vote counts are atomics, so `is_stopped` / `is_delayed` /
//! `needs_speedup_compaction` are lock-free; the delay bucket sits behind a
//! mutex so its fields change atomically as a group.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::bucket::DelayBucket;
use crate::clock::Clock;
use crate::config::WriteControllerConfig;
use crate::token::{CompactionPressureToken, DelayToken, StopToken};

/// State shared between the controller and all outstanding tokens.
///
/// Tokens hold an `Arc` to this registry, so a vote stays valid even if the
/// controller handle that minted it is dropped first.
#[derive(Debug)]
pub(crate) struct Shared {
    stop_votes: AtomicU64,
    delay_votes: AtomicU64,
    pressure_votes: AtomicU64,
    bucket: Mutex<DelayBucket>,
}

impl Shared {
    pub(crate) fn release_stop(&self) {
        let prev = self.stop_votes.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "stop vote count underflow");
        if prev == 1 {
            tracing::debug!("write stall released");
        }
    }

    pub(crate) fn release_delay(&self) {
        let prev = self.delay_votes.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "delay vote count underflow");
        if prev == 1 {
            tracing::debug!("write delay released");
        }
    }

    pub(crate) fn release_pressure(&self) {
        let prev = self.pressure_votes.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "compaction pressure vote count underflow");
    }
}

/// Snapshot of the controller's observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteControllerStats {
    /// Outstanding stop votes.
    pub stop_votes: u64,
    /// Outstanding delay votes.
    pub delay_votes: u64,
    /// Outstanding compaction pressure votes.
    pub compaction_pressure_votes: u64,
    /// The delay rate currently in effect, in bytes per second.
    pub delayed_write_rate: u64,
}

/// Admission controller pacing and stopping foreground writes.
///
/// One controller exists per storage engine instance. Cloning the handle is
/// cheap and shares the same underlying state.
///
/// # Example
///
/// ```rust
/// use writeflow::{ManualClock, WriteController, WriteControllerConfig};
///
/// let controller = WriteController::new(&WriteControllerConfig::for_testing());
/// let clock = ManualClock::new(6666);
///
/// // A flush under memory pressure votes to pace writers at 10 MB/s.
/// let token = controller.new_delay_token(controller.delayed_write_rate());
///
/// // A writer with a 20 MB batch is told to sleep two seconds.
/// assert_eq!(controller.delay_us(&clock, 20_000_000), 2_000_000);
///
/// // Pressure subsides; writes flow freely again.
/// drop(token);
/// assert_eq!(controller.delay_us(&clock, 20_000_000), 0);
/// ```
#[derive(Debug, Clone)]
pub struct WriteController {
    shared: Arc<Shared>,
}

impl WriteController {
    /// Creates a controller with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if `config.delayed_write_rate` is zero. Call
    /// [`WriteControllerConfig::validate`] first to surface this as an error
    /// instead.
    #[must_use]
    pub fn new(config: &WriteControllerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                stop_votes: AtomicU64::new(0),
                delay_votes: AtomicU64::new(0),
                pressure_votes: AtomicU64::new(0),
                bucket: Mutex::new(DelayBucket::new(config.delayed_write_rate)),
            }),
        }
    }

    /// Mints a stop vote: writers must not proceed while it is held.
    #[must_use]
    pub fn new_stop_token(&self) -> StopToken {
        let prev = self.shared.stop_votes.fetch_add(1, Ordering::AcqRel);
        if prev == 0 {
            tracing::debug!("write stall engaged");
        }
        StopToken::new(Arc::clone(&self.shared))
    }

    /// Mints a delay vote: writers are paced at `rate` bytes per second
    /// while any delay vote is held.
    ///
    /// The most recently minted token dictates the rate. Minting discards
    /// all carried bucket state, so allowance earned at the old rate is
    /// never spent at the new one.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is zero.
    #[must_use]
    pub fn new_delay_token(&self, rate: u64) -> DelayToken {
        assert!(rate > 0, "delay rate must be positive");
        {
            let mut bucket = self.shared.bucket.lock().expect("bucket lock poisoned");
            bucket.reset(rate);
            let prev = self.shared.delay_votes.fetch_add(1, Ordering::AcqRel);
            if prev == 0 {
                tracing::debug!(rate_bytes_per_sec = rate, "write delay engaged");
            } else {
                tracing::debug!(rate_bytes_per_sec = rate, "write delay rate changed");
            }
        }
        DelayToken::new(Arc::clone(&self.shared))
    }

    /// Mints a compaction pressure vote: writes are not held back, but
    /// background compaction should be sped up while it is held.
    #[must_use]
    pub fn new_compaction_pressure_token(&self) -> CompactionPressureToken {
        self.shared.pressure_votes.fetch_add(1, Ordering::AcqRel);
        CompactionPressureToken::new(Arc::clone(&self.shared))
    }

    /// Returns whether any stop vote is outstanding.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stop_votes.load(Ordering::Acquire) > 0
    }

    /// Returns whether any delay vote is outstanding.
    #[must_use]
    pub fn is_delayed(&self) -> bool {
        self.shared.delay_votes.load(Ordering::Acquire) > 0
    }

    /// Returns whether background compaction should be sped up: true while
    /// writers are stopped, delayed, or any pressure vote is outstanding.
    #[must_use]
    pub fn needs_speedup_compaction(&self) -> bool {
        self.is_stopped()
            || self.is_delayed()
            || self.shared.pressure_votes.load(Ordering::Acquire) > 0
    }

    /// Returns the delay rate currently in effect, in bytes per second.
    ///
    /// Starts at the configured default and follows the most recently minted
    /// delay token. Callers voting "at the default rate" pass this value to
    /// [`new_delay_token`](Self::new_delay_token).
    #[must_use]
    pub fn delayed_write_rate(&self) -> u64 {
        self.shared
            .bucket
            .lock()
            .expect("bucket lock poisoned")
            .rate()
    }

    /// Returns how long the caller must sleep before writing `num_bytes`.
    ///
    /// Zero when no delay votes are outstanding. Also zero while stopped:
    /// callers must check [`is_stopped`](Self::is_stopped) separately and
    /// not issue the write at all in that case.
    ///
    /// The returned duration is not clamped; a request far larger than one
    /// refill's worth of bytes is billed in full and the caller decides how
    /// to chunk or cancel the wait.
    pub fn delay_us<C: Clock>(&self, clock: &C, num_bytes: u64) -> u64 {
        if self.is_stopped() {
            return 0;
        }
        if !self.is_delayed() {
            return 0;
        }
        self.shared
            .bucket
            .lock()
            .expect("bucket lock poisoned")
            .delay_us(clock, num_bytes)
    }

    /// Returns a snapshot of vote counts and the effective rate.
    #[must_use]
    pub fn stats(&self) -> WriteControllerStats {
        WriteControllerStats {
            stop_votes: self.shared.stop_votes.load(Ordering::Acquire),
            delay_votes: self.shared.delay_votes.load(Ordering::Acquire),
            compaction_pressure_votes: self.shared.pressure_votes.load(Ordering::Acquire),
            delayed_write_rate: self.delayed_write_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn controller() -> WriteController {
        WriteController::new(&WriteControllerConfig::for_testing())
    }

    #[test]
    fn test_stop_votes_compose() {
        let controller = controller();

        let stop_1 = controller.new_stop_token();
        let stop_2 = controller.new_stop_token();
        assert!(controller.is_stopped());

        drop(stop_1);
        assert!(controller.is_stopped());

        drop(stop_2);
        assert!(!controller.is_stopped());
    }

    #[test]
    fn test_changing_delay_rate() {
        let clock = ManualClock::new(6666);
        let controller = controller();

        let _token_0 = controller.new_delay_token(controller.delayed_write_rate());
        assert_eq!(controller.delay_us(&clock, 20_000_000), 2_000_000);

        let _token_1 = controller.new_delay_token(2_000_000);
        assert_eq!(controller.delay_us(&clock, 20_000_000), 10_000_000);

        let _token_2 = controller.new_delay_token(1_000_000);
        assert_eq!(controller.delay_us(&clock, 20_000_000), 20_000_000);

        let _token_3 = controller.new_delay_token(20_000_000);
        assert_eq!(controller.delay_us(&clock, 20_000_000), 1_000_000);

        let _token_4 = controller.new_delay_token(controller.delayed_write_rate() * 2);
        assert_eq!(controller.delay_us(&clock, 20_000_000), 500_000);
    }

    #[test]
    fn test_new_delay_token_resets_bucket() {
        let clock = ManualClock::new(6666);
        let controller = controller();

        let _token_1 = controller.new_delay_token(10_000_000);
        assert_eq!(controller.delay_us(&clock, 20_000_000), 2_000_000);
        clock.advance(2_000_000);

        // The sleep fully elapsed, but a fresh token discards the settled
        // state: the next large write pays in full again.
        let _token_2 = controller.new_delay_token(10_000_000);
        assert_eq!(controller.delay_us(&clock, 20_000_000), 2_000_000);
    }

    #[test]
    fn test_no_votes_means_no_delay() {
        let clock = ManualClock::new(6666);
        let controller = controller();

        assert_eq!(controller.delay_us(&clock, 30_000_000), 0);
        assert!(!controller.is_stopped());
        assert!(!controller.is_delayed());
    }

    #[test]
    fn test_dropping_last_delay_token_ends_delays() {
        let clock = ManualClock::new(6666);
        let controller = controller();

        let token = controller.new_delay_token(10_000_000);
        assert!(controller.is_delayed());

        drop(token);
        assert!(!controller.is_delayed());
        assert_eq!(controller.delay_us(&clock, 30_000_000), 0);
    }

    #[test]
    fn test_stopped_suppresses_delay_answer() {
        let clock = ManualClock::new(6666);
        let controller = controller();

        let _delay = controller.new_delay_token(10_000_000);
        let _stop = controller.new_stop_token();

        // The answer is meaningless under stop; callers check is_stopped.
        assert!(controller.is_stopped());
        assert_eq!(controller.delay_us(&clock, 20_000_000), 0);
    }

    #[test]
    fn test_delayed_write_rate_tracks_latest_token() {
        let controller = controller();
        assert_eq!(controller.delayed_write_rate(), 10_000_000);

        let _token_1 = controller.new_delay_token(4_000_000);
        assert_eq!(controller.delayed_write_rate(), 4_000_000);

        let _token_2 = controller.new_delay_token(8_000_000);
        assert_eq!(controller.delayed_write_rate(), 8_000_000);

        // Dropping a token never rolls the rate back.
        drop(_token_1);
        assert_eq!(controller.delayed_write_rate(), 8_000_000);
    }

    #[test]
    fn test_compaction_pressure() {
        let controller = controller();
        assert!(!controller.needs_speedup_compaction());

        let pressure = controller.new_compaction_pressure_token();
        assert!(controller.needs_speedup_compaction());
        assert!(!controller.is_stopped());
        assert!(!controller.is_delayed());

        drop(pressure);
        assert!(!controller.needs_speedup_compaction());

        // Stops and delays also ask for faster compaction.
        let stop = controller.new_stop_token();
        assert!(controller.needs_speedup_compaction());
        drop(stop);

        let delay = controller.new_delay_token(1_000_000);
        assert!(controller.needs_speedup_compaction());
        drop(delay);
        assert!(!controller.needs_speedup_compaction());
    }

    #[test]
    fn test_stats_snapshot() {
        let controller = controller();

        let _stop = controller.new_stop_token();
        let _delay_1 = controller.new_delay_token(2_000_000);
        let _delay_2 = controller.new_delay_token(5_000_000);
        let _pressure = controller.new_compaction_pressure_token();

        assert_eq!(
            controller.stats(),
            WriteControllerStats {
                stop_votes: 1,
                delay_votes: 2,
                compaction_pressure_votes: 1,
                delayed_write_rate: 5_000_000,
            }
        );
    }

    #[test]
    fn test_tokens_outlive_the_minting_handle() {
        let controller = controller();
        let observer = controller.clone();

        let stop = controller.new_stop_token();
        drop(controller);

        assert!(observer.is_stopped());
        drop(stop);
        assert!(!observer.is_stopped());
    }

    #[test]
    fn test_concurrent_votes_and_delays() {
        let controller = controller();
        let clock = std::sync::Arc::new(ManualClock::new(6666));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let controller = controller.clone();
                let clock = std::sync::Arc::clone(&clock);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if i % 2 == 0 {
                            let token = controller.new_stop_token();
                            let _ = controller.is_stopped();
                            drop(token);
                        } else {
                            let token = controller.new_delay_token(10_000_000);
                            let _ = controller.delay_us(&*clock, 4096);
                            drop(token);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("voter thread panicked");
        }

        assert!(!controller.is_stopped());
        assert!(!controller.is_delayed());
        assert_eq!(controller.stats().stop_votes, 0);
        assert_eq!(controller.stats().delay_votes, 0);
    }
}
