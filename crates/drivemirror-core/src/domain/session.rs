//! Session credentials handed to execution units
//!
//! A [`SessionToken`] carries everything an execution unit needs to call the
//! API and to refresh its access token without user interaction. It is
//! serialized to JSON in the token file; the field aliases accept the
//! authorized-user format written by Google's client libraries
//! (`token`, `expiry`).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Default OAuth2 token endpoint
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Default Drive API v3 base URL
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Seconds before expiry at which a token is renewed
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Endpoints a session talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEndpoints {
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for SessionEndpoints {
    fn default() -> Self {
        Self {
            token_uri: default_token_uri(),
            api_base_url: default_api_base_url(),
        }
    }
}

/// A refreshable API session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Bearer token for API requests
    #[serde(alias = "token")]
    pub access_token: String,
    /// Long-lived token used to obtain new access tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// When the access token expires; `None` means unknown
    #[serde(default, alias = "expiry")]
    pub expires_at: Option<DateTime<Utc>>,
    /// OAuth2 client id the tokens were issued to
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(flatten)]
    pub endpoints: SessionEndpoints,
}

impl SessionToken {
    /// Creates a session with default endpoints and no refresh capability
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            client_id: String::new(),
            client_secret: None,
            endpoints: SessionEndpoints::default(),
        }
    }

    pub fn with_refresh(
        mut self,
        refresh_token: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<String>,
    ) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self.client_id = client_id.into();
        self.client_secret = client_secret;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_endpoints(mut self, endpoints: SessionEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Returns true if the access token will expire within `duration`
    ///
    /// A token without a known expiry is treated as expiring.
    pub fn expires_within(&self, duration: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + duration >= expires_at,
            None => true,
        }
    }

    /// Returns true if the token expires within [`REFRESH_MARGIN_SECS`]
    pub fn needs_refresh(&self) -> bool {
        self.expires_within(Duration::seconds(REFRESH_MARGIN_SECS))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_within(Duration::zero())
    }

    /// Returns true if the session carries what a refresh needs
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty()) && !self.client_id.is_empty()
    }

    /// Checks that the token is usable for API calls
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidSession`] if the access token is empty.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.access_token.trim().is_empty() {
            return Err(DomainError::InvalidSession(
                "empty access token".to_string(),
            ));
        }
        Ok(())
    }
}

// Secrets stay out of logs
impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("client_id", &self.client_id)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}
