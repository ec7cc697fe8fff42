//! Progress callback port
//!
//! The presentation layer observes a run only through this contract. It is
//! called once per completed item with `(completed, total, description)`,
//! where `description` is the local path for downloaded or existing files
//! and the item name otherwise.

use thiserror::Error;

/// Receives progress updates from a mirror run
///
/// Plain closures `FnMut(usize, usize, &str) + Send` implement this trait
/// and never fail. Implement it directly to report errors.
pub trait ProgressCallback: Send {
    fn report(&mut self, completed: usize, total: usize, description: &str) -> anyhow::Result<()>;
}

impl<F> ProgressCallback for F
where
    F: FnMut(usize, usize, &str) + Send,
{
    fn report(&mut self, completed: usize, total: usize, description: &str) -> anyhow::Result<()> {
        self(completed, total, description);
        Ok(())
    }
}

/// A progress callback misbehaved
///
/// Never fatal: the aggregator logs it and keeps going.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("progress callback failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("progress callback panicked: {0}")]
    Panicked(String),
}
