//! Port definitions
//!
//! Ports are the interfaces the mirroring engine depends on but does not
//! implement itself.
//!
//! ## Ports Overview
//!
//! - [`CredentialProvider`] - Supplies and refreshes API sessions
//! - [`ProgressCallback`] - Receives `(completed, total, description)` updates

pub mod credentials;
pub mod progress;

pub use credentials::{CredentialProvider, RefreshError, StaticCredentialProvider};
pub use progress::{CallbackError, ProgressCallback};
