//! Messages emitted by a mirror run
//!
//! A run produces a lazy sequence of [`MirrorMessage`] values. Every
//! non-folder item yields exactly one terminal message (see
//! [`MirrorMessage::is_terminal`]); the sequence always ends with either
//! [`MirrorMessage::Finished`] or, for an empty item set,
//! [`MirrorMessage::NoFiles`].

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

// ============================================================================
// FetchOutcome
// ============================================================================

/// Successful result of fetching a single item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Content was written to the given path
    Downloaded(PathBuf),
    /// The final path already existed; nothing was requested
    SkippedExists(PathBuf),
    /// Native document type with no export format; carries the item name
    SkippedNoExport(String),
}

// ============================================================================
// MirrorMessage
// ============================================================================

/// One line of the run's output stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MirrorMessage {
    Downloaded { path: PathBuf },
    SkippedExists { path: PathBuf },
    SkippedNoExport { name: String },
    Error { name: String, reason: String },
    Warning { detail: String },
    /// Sentinel closing a run that had at least one item
    Finished,
    /// Sentinel for a run with nothing to transfer
    NoFiles,
}

impl MirrorMessage {
    pub fn error(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Error {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn warning(detail: impl Into<String>) -> Self {
        Self::Warning {
            detail: detail.into(),
        }
    }

    /// Returns true for per-item outcomes, which count towards progress
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Downloaded { .. }
                | Self::SkippedExists { .. }
                | Self::SkippedNoExport { .. }
                | Self::Error { .. }
        )
    }

    /// Returns true for the end-of-run sentinels
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Finished | Self::NoFiles)
    }

    /// Text passed to the progress callback for a terminal message
    ///
    /// The local path for downloads and existing files, the item name for
    /// everything else. `None` for non-terminal messages.
    pub fn description(&self) -> Option<String> {
        match self {
            Self::Downloaded { path } | Self::SkippedExists { path } => {
                Some(path.display().to_string())
            }
            Self::SkippedNoExport { name } | Self::Error { name, .. } => Some(name.clone()),
            Self::Warning { .. } | Self::Finished | Self::NoFiles => None,
        }
    }
}

impl From<FetchOutcome> for MirrorMessage {
    fn from(outcome: FetchOutcome) -> Self {
        match outcome {
            FetchOutcome::Downloaded(path) => Self::Downloaded { path },
            FetchOutcome::SkippedExists(path) => Self::SkippedExists { path },
            FetchOutcome::SkippedNoExport(name) => Self::SkippedNoExport { name },
        }
    }
}

impl fmt::Display for MirrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloaded { path } => write!(f, "Downloaded: {}", path.display()),
            Self::SkippedExists { path } => write!(f, "Skipped (exists): {}", path.display()),
            Self::SkippedNoExport { name } => write!(f, "Skipped (no export type): {}", name),
            Self::Error { name, reason } => write!(f, "Error downloading {}: {}", name, reason),
            Self::Warning { detail } => write!(f, "WARNING: {}", detail),
            Self::Finished => write!(f, "All worker processes finished."),
            Self::NoFiles => write!(f, "No files found."),
        }
    }
}
