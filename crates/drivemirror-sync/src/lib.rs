//! Drive Mirror Sync - Concurrent mirroring engine
//!
//! Provides:
//! - Local directory materialization from the remote folder hierarchy
//! - Partitioning of the item set across parallel execution units
//! - Bounded concurrent transfers inside each unit
//! - A single merged, lazily consumed message stream with progress reporting
//!
//! ## Modules
//!
//! - [`engine`] - [`DriveMirror`](engine::DriveMirror), the run entry point
//! - [`filesystem`] - Path resolution and directory creation
//! - [`progress`] - Progress aggregation and callback isolation
//! - [`scheduler`] - Unit partitioning and the [`MirrorRun`](scheduler::MirrorRun) consumer
//! - [`unit`] - Execution unit: one OS thread with its own runtime and client

pub mod engine;
pub mod filesystem;
pub mod progress;
pub mod scheduler;
pub mod unit;

use drivemirror_core::ports::credentials::RefreshError;
use drivemirror_drive::DriveError;
use thiserror::Error;

/// Failures that abort a run before any transfer starts
///
/// Per-item failures never surface here; they become
/// `Error downloading …` messages in the run's output.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The remote listing failed
    #[error("metadata listing failed: {0}")]
    Metadata(#[from] DriveError),

    /// No initial session could be obtained
    #[error("could not obtain a session: {0}")]
    Credentials(#[from] RefreshError),
}

/// Renders a panic payload as text
pub(crate) fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
