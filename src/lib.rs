//! Write admission control for log-structured storage engines.
//!
//! This crate provides the controller through which background pressure
//! (full memtables, too many level-0 files, pending compaction bytes) is fed
//! back to foreground writers. Stress producers hold RAII vote tokens;
//! writers ask the controller how long to sleep before each batch.
//!
//! - **Stop votes**: while any [`StopToken`] is held, writers must not
//!   proceed at all.
//! - **Delay votes**: while any [`DelayToken`] is held, writers are paced to
//!   the byte rate fixed by the most recently minted token.
//! - **Pressure votes**: a [`CompactionPressureToken`] asks for faster
//!   background compaction without holding writers back.
//!
//! # Architecture
//!
//! ```text
//! flush / compaction ──votes──▶ WriteController ◀──delay_us(clock, n)── writers
//!                               │  vote counts (atomics)
//!                               └─ DelayBucket  (mutex)
//! ```
//!
//! The controller never sleeps and never spawns work: [`delay_us`] returns a
//! duration and the caller decides how to wait, which keeps shutdown and
//! cancellation in the caller's hands. Writes served from the bucket's
//! balance never read the clock, so the uncontended path has no syscall
//! cost.
//!
//! # Deterministic time
//!
//! All time-dependent behavior goes through the [`Clock`] trait, passed into
//! each call rather than stored. Production uses [`MonotonicClock`]; tests
//! and simulations drive a [`ManualClock`] by hand.
//!
//! # Example
//!
//! ```rust
//! use writeflow::{ManualClock, WriteController, WriteControllerConfig};
//!
//! let config = WriteControllerConfig::new(10_000_000); // 10 MB/s
//! let controller = WriteController::new(&config);
//! let clock = ManualClock::new(0);
//!
//! // Compaction falls behind: pace writers at the default rate.
//! let delay = controller.new_delay_token(controller.delayed_write_rate());
//! assert_eq!(controller.delay_us(&clock, 20_000_000), 2_000_000);
//!
//! // Memtables fill up entirely: stop writers outright.
//! let stop = controller.new_stop_token();
//! assert!(controller.is_stopped());
//!
//! drop(stop);
//! drop(delay);
//! assert!(!controller.is_stopped() && !controller.is_delayed());
//! ```
//!
//! [`delay_us`]: WriteController::delay_us

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bucket;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod token;

// Re-export main types for convenience.
pub use bucket::{DelayBucket, REFILL_INTERVAL_US};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{WriteControllerConfig, DEFAULT_DELAYED_WRITE_RATE};
pub use controller::{WriteController, WriteControllerStats};
pub use error::{ControlError, ControlResult};
pub use token::{CompactionPressureToken, DelayToken, StopToken};
