//! RAII vote tokens.
//!
//! A token is a held vote: it takes effect when minted and is withdrawn when
//! dropped. Tokens hold a shared reference to the controller's registry, so
//! they remain valid even if the controller handle that minted them is
//! dropped first, and they may move freely between the threads of the
//! stress producer that owns them.

use std::sync::Arc;

use crate::controller::Shared;

/// A held vote that writers must not proceed at all.
///
/// Minted by [`WriteController::new_stop_token`]. Multiple stop tokens
/// compose by count: writes resume only once every one of them is dropped.
///
/// [`WriteController::new_stop_token`]: crate::WriteController::new_stop_token
#[must_use = "dropping the token immediately withdraws the stop vote"]
#[derive(Debug)]
pub struct StopToken {
    shared: Arc<Shared>,
}

impl StopToken {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl Drop for StopToken {
    fn drop(&mut self) {
        self.shared.release_stop();
    }
}

/// A held vote that writers should be paced at a fixed byte rate.
///
/// Minted by [`WriteController::new_delay_token`], which also fixes the rate
/// in effect and resets the delay bucket. A producer whose opinion of the
/// rate changes drops its token and mints a new one.
///
/// [`WriteController::new_delay_token`]: crate::WriteController::new_delay_token
#[must_use = "dropping the token immediately withdraws the delay vote"]
#[derive(Debug)]
pub struct DelayToken {
    shared: Arc<Shared>,
}

impl DelayToken {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl Drop for DelayToken {
    fn drop(&mut self) {
        self.shared.release_delay();
    }
}

/// A held vote that background compaction should be sped up.
///
/// Minted by [`WriteController::new_compaction_pressure_token`]. Does not
/// stop or delay writers.
///
/// [`WriteController::new_compaction_pressure_token`]: crate::WriteController::new_compaction_pressure_token
#[must_use = "dropping the token immediately withdraws the pressure vote"]
#[derive(Debug)]
pub struct CompactionPressureToken {
    shared: Arc<Shared>,
}

impl CompactionPressureToken {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl Drop for CompactionPressureToken {
    fn drop(&mut self) {
        self.shared.release_pressure();
    }
}
