//! Write controller configuration.

use crate::error::{ControlError, ControlResult};

/// Default delayed write rate: 16 MiB/s.
pub const DEFAULT_DELAYED_WRITE_RATE: u64 = 16 * 1024 * 1024;

/// Configuration for a [`WriteController`](crate::WriteController).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteControllerConfig {
    /// Write rate in bytes per second applied when a delay vote is cast at
    /// the default rate. Must be positive.
    pub delayed_write_rate: u64,
}

impl WriteControllerConfig {
    /// Creates a configuration with the given default delayed write rate.
    #[must_use]
    pub const fn new(delayed_write_rate: u64) -> Self {
        Self { delayed_write_rate }
    }

    /// Creates a configuration for testing: 10 MB/s.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            delayed_write_rate: 10_000_000,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidConfig` if the rate is zero.
    pub fn validate(&self) -> ControlResult<()> {
        if self.delayed_write_rate == 0 {
            return Err(ControlError::InvalidConfig {
                message: "delayed_write_rate must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for WriteControllerConfig {
    fn default() -> Self {
        Self {
            delayed_write_rate: DEFAULT_DELAYED_WRITE_RATE,
        }
    }
}
