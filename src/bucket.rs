//! Byte-debt token bucket.
//!
//! A [`DelayBucket`] turns a requested write size into a sleep duration such
//! that the long-run throughput across all callers converges to the
//! configured byte rate. Unlike a classic capped bucket, it lets a single
//! call borrow arbitrarily far ahead: the caller is handed the full sleep up
//! front and the bucket remembers the time up to which that sleep has
//! already paid for refills.
//!
//! All accounting lives in two fields:
//!
//! - `bytes_left`: allowance already granted but not yet consumed.
//! - `paid_until_us`: the timestamp refills are settled up to. A value in
//!   the *future* is outstanding sleep debt (the caller is still sleeping
//!   off an earlier grant); a value in the *past* means wall time has gone
//!   by that no sleep accounted for, and converts into extra allowance on
//!   the next slow-path call.

use crate::clock::Clock;

/// Length of one refill interval in microseconds.
///
/// Allowance is granted in whole intervals: a caller that cannot be served
/// from the current balance sleeps at least to the end of the next interval.
pub const REFILL_INTERVAL_US: u64 = 1024;

const MICROS_PER_SEC: u64 = 1_000_000;

/// Bytes earned at `rate` bytes/sec over `micros` microseconds.
fn bytes_for(rate: u64, micros: u64) -> u64 {
    u64::try_from(u128::from(rate) * u128::from(micros) / u128::from(MICROS_PER_SEC))
        .unwrap_or(u64::MAX)
}

/// Microseconds needed to earn `bytes` at `rate` bytes/sec.
fn micros_for(rate: u64, bytes: u64) -> u64 {
    u64::try_from(u128::from(bytes) * u128::from(MICROS_PER_SEC) / u128::from(rate))
        .unwrap_or(u64::MAX)
}

/// Token bucket that converts write sizes into sleep durations.
///
/// The bucket is not thread-safe on its own; the controller guards it with a
/// mutex so refills and balance updates change atomically as a group.
#[derive(Debug)]
pub struct DelayBucket {
    /// Target write rate in bytes per second.
    rate: u64,

    /// Allowance granted but not yet consumed.
    bytes_left: u64,

    /// Time refills are settled up to. Zero until the first slow-path call
    /// establishes a timeline.
    paid_until_us: u64,
}

impl DelayBucket {
    /// Creates an empty bucket at the given rate.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is zero.
    #[must_use]
    pub fn new(rate: u64) -> Self {
        assert!(rate > 0, "delay rate must be positive");
        Self {
            rate,
            bytes_left: 0,
            paid_until_us: 0,
        }
    }

    /// Returns the target rate in bytes per second.
    #[must_use]
    pub const fn rate(&self) -> u64 {
        self.rate
    }

    /// Discards all carried state and starts over at `rate`.
    ///
    /// A rate change must not spend allowance earned at the old rate, so the
    /// balance and the settled-up-to time are both cleared.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is zero.
    pub fn reset(&mut self, rate: u64) {
        assert!(rate > 0, "delay rate must be positive");
        self.rate = rate;
        self.bytes_left = 0;
        self.paid_until_us = 0;
    }

    /// Returns how long the caller must sleep before writing `num_bytes`.
    ///
    /// The clock is consulted only when the current balance cannot cover the
    /// request, which on a steady stream of small writes happens at most
    /// once per refill interval.
    pub fn delay_us<C: Clock>(&mut self, clock: &C, num_bytes: u64) -> u64 {
        if self.bytes_left >= num_bytes {
            self.bytes_left -= num_bytes;
            return 0;
        }

        let now_us = clock.now_us();

        let mut debt_us = 0;
        let mut elapsed_us = 0;
        if self.paid_until_us != 0 {
            if self.paid_until_us > now_us {
                debt_us = self.paid_until_us - now_us;
            } else {
                elapsed_us = now_us - self.paid_until_us;
            }
        }

        // Settle whole elapsed intervals first. Sub-interval remainders stay
        // in `paid_until_us` and are folded into the next grant instead.
        if elapsed_us >= REFILL_INTERVAL_US {
            self.bytes_left = self
                .bytes_left
                .saturating_add(bytes_for(self.rate, elapsed_us));
            self.paid_until_us = now_us;
            elapsed_us = 0;
            if self.bytes_left >= num_bytes {
                self.bytes_left -= num_bytes;
                return 0;
            }
        }

        let granted = self.bytes_left.saturating_add(bytes_for(
            self.rate,
            elapsed_us.saturating_add(REFILL_INTERVAL_US),
        ));
        if granted >= num_bytes {
            // One more refill covers the request: sleep to the end of the
            // next interval plus any outstanding debt, and bank the surplus.
            let sleep_us = REFILL_INTERVAL_US + debt_us;
            self.bytes_left = granted - num_bytes;
            self.paid_until_us = now_us.saturating_add(sleep_us);
            return sleep_us;
        }

        // The request dwarfs a single refill. Charge it purely as time: the
        // balance is kept for later small writes and the settled-up-to time
        // moves past the end of the sleep, so an early return shows up as
        // debt on the next call and an over-sleep as credit.
        let sleep_us = micros_for(self.rate, num_bytes).saturating_add(debt_us);
        self.paid_until_us = now_us.saturating_add(sleep_us);
        sleep_us
    }
}
