//! OAuth2 session refresh and token-file credentials
//!
//! Interactive login is out of scope: sessions are created elsewhere and
//! stored as JSON. This module renews their access tokens through the
//! OAuth2 refresh-token grant and keeps the token file up to date.
//!
//! ## Components
//!
//! - [`refresh_session`] - Refresh-token grant against the session's token endpoint
//! - [`TokenFileCredentialProvider`] - [`CredentialProvider`] backed by a JSON token file

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use drivemirror_core::domain::session::{SessionEndpoints, SessionToken};
use drivemirror_core::ports::credentials::{CredentialProvider, RefreshError};
use oauth2::{
    basic::BasicClient, AuthType, ClientId, ClientSecret, RefreshToken, RequestTokenError,
    TokenResponse, TokenUrl,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

// ============================================================================
// Refresh grant
// ============================================================================

/// Exchanges the session's refresh token for a new access token
///
/// # Arguments
/// * `http_client` - Client used to call the token endpoint
/// * `session` - Session holding the refresh token, client id and token URI
///
/// # Returns
/// A copy of `session` with the new access token and expiry. The refresh
/// token is replaced only when the endpoint issues a new one.
pub async fn refresh_session(
    http_client: &reqwest::Client,
    session: &SessionToken,
) -> Result<SessionToken, RefreshError> {
    let refresh_token = match session.refresh_token.as_deref() {
        Some(token) if session.can_refresh() => token,
        _ => return Err(RefreshError::MissingRefreshToken),
    };

    let token_url = TokenUrl::new(session.endpoints.token_uri.clone())
        .map_err(|e| RefreshError::Rejected(format!("invalid token URI: {}", e)))?;

    let mut client = BasicClient::new(ClientId::new(session.client_id.clone()))
        .set_token_uri(token_url)
        .set_auth_type(AuthType::RequestBody);
    if let Some(secret) = &session.client_secret {
        client = client.set_client_secret(ClientSecret::new(secret.clone()));
    }

    debug!(token_uri = %session.endpoints.token_uri, "Refreshing access token");

    let token_result = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request_async(http_client)
        .await
        .map_err(|e| match e {
            RequestTokenError::ServerResponse(response) => {
                RefreshError::Rejected(response.to_string())
            }
            RequestTokenError::Request(e) => RefreshError::Transport(e.to_string()),
            other => RefreshError::Rejected(other.to_string()),
        })?;

    let expires_at = token_result
        .expires_in()
        .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
        .unwrap_or_else(|| Utc::now() + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));

    let mut refreshed = session.clone();
    refreshed.access_token = token_result.access_token().secret().to_string();
    refreshed.expires_at = Some(expires_at);
    if let Some(new_refresh) = token_result.refresh_token() {
        refreshed.refresh_token = Some(new_refresh.secret().to_string());
    }

    info!("Successfully refreshed access token");
    Ok(refreshed)
}

// ============================================================================
// TokenFileCredentialProvider
// ============================================================================

/// Credential provider reading and updating a JSON token file
///
/// The file holds a serialized [`SessionToken`]; Google's authorized-user
/// format is accepted as well. Refreshed sessions are written back
/// atomically so later runs start from the newest token.
pub struct TokenFileCredentialProvider {
    path: PathBuf,
    http_client: reqwest::Client,
    endpoints: Option<SessionEndpoints>,
    write_lock: Mutex<()>,
}

impl TokenFileCredentialProvider {
    /// Creates a provider for the token file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            http_client: reqwest::Client::new(),
            endpoints: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Forces the endpoints of every loaded session
    pub fn with_endpoints(mut self, endpoints: SessionEndpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<SessionToken, RefreshError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RefreshError::Storage(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let mut session: SessionToken = serde_json::from_str(&content).map_err(|e| {
            RefreshError::Storage(format!("cannot parse {}: {}", self.path.display(), e))
        })?;
        if let Some(endpoints) = &self.endpoints {
            session.endpoints = endpoints.clone();
        }
        session.validate()?;
        Ok(session)
    }

    /// Writes the session next to the token file, then renames it into place
    async fn store(&self, session: &SessionToken) -> Result<(), RefreshError> {
        let _guard = self.write_lock.lock().await;

        let json = serde_json::to_string_pretty(session)
            .map_err(|e| RefreshError::Storage(format!("cannot serialize session: {}", e)))?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let write = async {
            tokio::fs::write(&tmp_path, json.as_bytes()).await?;
            tokio::fs::rename(&tmp_path, &self.path).await
        };
        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(RefreshError::Storage(format!(
                "cannot write {}: {}",
                self.path.display(),
                e
            )));
        }

        debug!(path = %self.path.display(), "Stored refreshed session");
        Ok(())
    }
}

#[async_trait]
impl CredentialProvider for TokenFileCredentialProvider {
    async fn session(&self) -> Result<SessionToken, RefreshError> {
        self.load().await
    }

    async fn refresh(&self, current: &SessionToken) -> Result<SessionToken, RefreshError> {
        let refreshed = refresh_session(&self.http_client, current).await?;

        // A stale file only costs an extra refresh next run
        if let Err(e) = self.store(&refreshed).await {
            warn!(error = %e, "Refreshed session was not persisted");
        }
        Ok(refreshed)
    }
}
