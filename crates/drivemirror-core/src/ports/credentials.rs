//! Credential provider port
//!
//! The engine never performs an interactive login. It asks a
//! [`CredentialProvider`] for an initial [`SessionToken`] and, while
//! transfers are running, for refreshed copies of that token.
//!
//! ## Design Notes
//!
//! - Uses `#[async_trait]` so the provider can be stored as
//!   `Arc<dyn CredentialProvider>` and shared by all execution units.
//! - Errors are a closed [`RefreshError`] enum; a failed refresh is reported
//!   as a warning by the caller, a failed initial session is fatal.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::domain::session::SessionToken;

/// Errors raised while obtaining or refreshing a session
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The provider holds a fixed token that cannot be renewed
    #[error("session is not refreshable")]
    NotRefreshable,

    /// The session lacks a refresh token or client id
    #[error("session has no refresh token")]
    MissingRefreshToken,

    /// The token endpoint answered but refused the request
    #[error("token endpoint rejected refresh: {0}")]
    Rejected(String),

    /// The token endpoint could not be reached
    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    /// The stored session could not be read or written
    #[error("credential storage error: {0}")]
    Storage(String),

    /// The stored session is malformed
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

/// Supplies API sessions to the mirroring engine
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns the current session, used once at run start
    async fn session(&self) -> Result<SessionToken, RefreshError>;

    /// Exchanges `current` for a session with a fresh access token
    ///
    /// # Arguments
    /// * `current` - The session an execution unit is holding
    ///
    /// # Returns
    /// A new session; `current` is left untouched so the caller can keep
    /// using it if the refresh fails.
    async fn refresh(&self, current: &SessionToken) -> Result<SessionToken, RefreshError>;
}

// ============================================================================
// StaticCredentialProvider
// ============================================================================

/// Provider around a fixed session that can never be refreshed
///
/// Useful for short runs with a freshly minted access token and for tests.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    session: SessionToken,
}

impl StaticCredentialProvider {
    pub fn new(session: SessionToken) -> Self {
        Self { session }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn session(&self) -> Result<SessionToken, RefreshError> {
        self.session.validate()?;
        Ok(self.session.clone())
    }

    async fn refresh(&self, _current: &SessionToken) -> Result<SessionToken, RefreshError> {
        Err(RefreshError::NotRefreshable)
    }
}
