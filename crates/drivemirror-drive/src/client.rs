//! Google Drive API client
//!
//! Provides an authenticated HTTP client for the Drive v3 REST API.
//! Handles bearer authentication, endpoint construction, and retrying of
//! throttled (429) and failed (5xx) requests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drivemirror_drive::client::DriveClient;
//! use drivemirror_drive::listing;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new("access-token-here");
//! let items = listing::list_items(&client).await?;
//! println!("{} items", items.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use drivemirror_core::domain::session::{SessionToken, DEFAULT_API_BASE_URL};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::DriveError;

/// Default retry-after duration when the header is missing or unparseable
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Longest Retry-After we are willing to honour
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Maximum number of retries for 429 and 5xx responses
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// First backoff step for 5xx retries; doubles per attempt
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Listing page size used unless configured otherwise
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Drive API calls
///
/// Wraps `reqwest::Client` with the bearer token and base URL. Cloning is
/// cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct DriveClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests, without a trailing slash
    base_url: String,
    /// Current OAuth2 access token
    access_token: String,
    max_retries: u32,
    backoff_base: Duration,
    page_size: u32,
}

impl DriveClient {
    /// Creates a new DriveClient against the public Drive API
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, DEFAULT_API_BASE_URL)
    }

    /// Creates a new DriveClient with a custom base URL (useful for testing)
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token
    /// * `base_url` - Custom base URL for API requests
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Creates a client for the API endpoint and access token of a session
    pub fn for_session(session: &SessionToken) -> Self {
        Self::with_base_url(
            session.access_token.clone(),
            session.endpoints.api_base_url.clone(),
        )
    }

    /// Replaces the underlying `reqwest::Client`
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the first 5xx backoff step (doubled on each further attempt)
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Updates the access token (e.g., after a token refresh)
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("Updated DriveClient access token");
    }

    /// Returns a reference to the current access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// Automatically prepends the base URL and adds the Authorization header.
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to base URL (e.g., "/files")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }

    /// Sends a request, retrying 429 and 5xx responses.
    ///
    /// - **429**: waits for the `Retry-After` header (seconds or HTTP-date),
    ///   falling back to 30 s when it is absent.
    /// - **5xx**: exponential backoff starting at the configured base.
    /// - Any other non-success status fails immediately with the matching
    ///   [`DriveError`]; in particular a 401 is never retried.
    ///
    /// Requests whose body cannot be cloned are sent exactly once.
    ///
    /// # Returns
    /// The successful response with its body still unread.
    pub async fn execute_with_retry(&self, request: RequestBuilder) -> Result<Response, DriveError> {
        let mut pending = Some(request);

        for attempt in 0..=self.max_retries {
            let Some(current) = pending.take() else {
                break;
            };
            let retry_copy = current.try_clone();

            let response = current.send().await?;
            let status = response.status();

            if status.is_success() {
                if attempt > 0 {
                    info!(attempt, "Request succeeded after retry");
                }
                return Ok(response);
            }

            let retryable =
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            let out_of_budget = attempt >= self.max_retries || retry_copy.is_none();

            if !retryable || out_of_budget {
                if retryable {
                    warn!(status = status.as_u16(), attempts = attempt + 1, "Retry limit exhausted");
                }
                return Err(Self::error_for(response).await);
            }

            let delay = if status == StatusCode::TOO_MANY_REQUESTS {
                response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                    .unwrap_or(DEFAULT_RETRY_AFTER)
            } else {
                self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
            };

            info!(
                status = status.as_u16(),
                attempt,
                retry_after_ms = delay.as_millis() as u64,
                "Request failed, backing off"
            );

            tokio::time::sleep(delay).await;
            pending = retry_copy;
        }

        Err(DriveError::InvalidResponse(
            "retry loop exited unexpectedly".to_string(),
        ))
    }

    /// Converts a non-success response into a [`DriveError`]
    async fn error_for(response: Response) -> DriveError {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                .unwrap_or(DEFAULT_RETRY_AFTER);
            return DriveError::TooManyRequests { retry_after };
        }
        let body = response.text().await.unwrap_or_default();
        DriveError::from_status(status, truncate_body(body))
    }
}

/// Keeps error bodies short enough for a single log or message line
fn truncate_body(body: String) -> String {
    const LIMIT: usize = 512;
    let trimmed = body.trim();
    if trimmed.chars().count() <= LIMIT {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(LIMIT).collect();
    short.push('…');
    short
}

/// Parses a `Retry-After` header value
///
/// Accepts delay-seconds or an HTTP-date (RFC 2822). Dates in the past map
/// to zero; values beyond one hour or that cannot be parsed fall back to
/// `default`.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        let delay = Duration::from_secs(seconds);
        return if delay > MAX_RETRY_AFTER { default } else { delay };
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let diff = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        return match diff.to_std() {
            Ok(delay) if delay <= MAX_RETRY_AFTER => delay,
            Ok(_) => default,
            Err(_) => Duration::ZERO,
        };
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
