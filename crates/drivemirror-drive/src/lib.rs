//! Drive Mirror Drive - Google Drive API v3 client
//!
//! Provides async client for:
//! - Listing every item visible to the account, shared items included
//! - Choosing an export format for native documents
//! - Streaming file content to disk with atomic publication
//! - Refreshing OAuth2 sessions stored in a token file
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 refresh and the token-file credential provider
//! - [`client`] - Authenticated HTTP client with retry handling
//! - [`export`] - Native document export mapping
//! - [`fetch`] - Content fetcher for a single item
//! - [`listing`] - Paginated metadata listing

pub mod auth;
pub mod client;
pub mod export;
pub mod fetch;
pub mod listing;

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when communicating with the Drive API
#[derive(Debug, Error)]
pub enum DriveError {
    /// Authentication credentials are invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded and the retry budget is spent
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration the server asked us to wait
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx) and the retry budget is spent
    #[error("Server error: {0}")]
    ServerError(String),

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DriveError {
    /// Classifies a non-success status and its body
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(body),
            StatusCode::FORBIDDEN => Self::Forbidden(body),
            StatusCode::NOT_FOUND => Self::NotFound(body),
            s if s.is_server_error() => Self::ServerError(format!("{}: {}", s.as_u16(), body)),
            s => Self::Status {
                status: s.as_u16(),
                message: body,
            },
        }
    }

    /// HTTP status that produced this error, when there was one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::TooManyRequests { .. } => Some(429),
            Self::Status { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::ServerError(_) | Self::InvalidResponse(_) => None,
        }
    }
}
