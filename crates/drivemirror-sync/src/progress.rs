//! Progress aggregation
//!
//! Sits between the scheduler's merged message stream and the caller's
//! [`ProgressCallback`]. Every terminal message bumps the explicit
//! [`ProgressState`] and is reported once; warnings and sentinels pass
//! through untouched. A callback that fails or panics is logged and
//! ignored so it can never abort a run.

use std::panic::{catch_unwind, AssertUnwindSafe};

use drivemirror_core::domain::message::MirrorMessage;
use drivemirror_core::domain::progress::ProgressState;
use drivemirror_core::ports::progress::{CallbackError, ProgressCallback};
use tracing::warn;

use crate::panic_detail;

/// Counts completions and forwards them to an optional callback
pub struct ProgressAggregator {
    state: ProgressState,
    callback: Option<Box<dyn ProgressCallback>>,
}

impl ProgressAggregator {
    pub fn new(total: usize) -> Self {
        Self {
            state: ProgressState::new(total),
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: Box<dyn ProgressCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn set_callback(&mut self, callback: Box<dyn ProgressCallback>) {
        self.callback = Some(callback);
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Accounts for one message on its way to the consumer
    ///
    /// Only terminal messages count. Completions beyond the total are
    /// ignored so a callback never sees `completed > total`.
    pub fn observe(&mut self, message: &MirrorMessage) {
        if !message.is_terminal() || self.state.is_complete() {
            return;
        }
        let Some(description) = message.description() else {
            return;
        };

        let completed = self.state.record();
        let total = self.state.total();

        if let Some(callback) = self.callback.as_mut() {
            if let Err(e) = invoke(callback.as_mut(), completed, total, &description) {
                warn!(completed, total, error = %e, "Ignoring progress callback failure");
            }
        }
    }
}

fn invoke(
    callback: &mut dyn ProgressCallback,
    completed: usize,
    total: usize,
    description: &str,
) -> Result<(), CallbackError> {
    match catch_unwind(AssertUnwindSafe(|| {
        callback.report(completed, total, description)
    })) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(CallbackError::Failed(e)),
        Err(payload) => Err(CallbackError::Panicked(panic_detail(payload.as_ref()))),
    }
}
