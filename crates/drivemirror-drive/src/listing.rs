//! Drive metadata listing
//!
//! Enumerates every non-trashed item visible to the account through
//! `GET /files`, following `nextPageToken` until the last page. Shared items
//! and items on shared drives are included.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drivemirror_drive::client::DriveClient;
//! use drivemirror_drive::listing;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new("access-token");
//! let items = listing::list_items(&client).await?;
//! let folders = items.iter().filter(|i| i.is_folder()).count();
//! println!("{} items, {} folders", items.len(), folders);
//! # Ok(())
//! # }
//! ```

use drivemirror_core::domain::item::{ItemKind, ItemRecord};
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::client::DriveClient;
use crate::DriveError;

/// Path of the files collection relative to the API base URL
const FILES_PATH: &str = "/files";

/// Partial-response field selector for listing pages
pub const LIST_FIELDS: &str =
    "nextPageToken, files(id, name, mimeType, parents, driveId, size, shared, ownedByMe)";

/// Search query excluding trashed items
const LIST_QUERY: &str = "trashed = false";

// ============================================================================
// Drive API response types (JSON deserialization)
// ============================================================================

/// Raw response from `GET /files`
///
/// See: <https://developers.google.com/drive/api/reference/rest/v3/files/list>
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilesListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,

    /// Token for the next page (absent on the last page)
    next_page_token: Option<String>,
}

/// A file resource restricted to the fields in [`LIST_FIELDS`]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    parents: Vec<String>,
    #[allow(dead_code)]
    drive_id: Option<String>,
    /// Byte size, encoded as a decimal string by the API
    size: Option<String>,
    #[serde(default)]
    shared: bool,
    owned_by_me: Option<bool>,
}

// ============================================================================
// ListingParser
// ============================================================================

/// Converts raw listing pages into [`ItemRecord`]s
pub struct ListingParser;

impl ListingParser {
    /// Maps one API file resource onto an item record
    ///
    /// - `kind` comes from the MIME type
    /// - only the first parent is kept
    /// - `shared` is set for items shared with the account or owned by
    ///   someone else
    /// - an unparseable `size` is dropped with a warning
    fn parse_file(file: DriveFile) -> ItemRecord {
        let size = file.size.as_deref().and_then(|raw| match raw.parse::<u64>() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!(id = %file.id, size = raw, "Ignoring unparseable size");
                None
            }
        });

        ItemRecord {
            kind: ItemKind::from_mime_type(&file.mime_type),
            parent_id: file.parents.into_iter().next(),
            shared: file.shared || file.owned_by_me == Some(false),
            size,
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
        }
    }

    /// Parses a page, returning its items and the next page token
    fn parse_page(page: FilesListResponse) -> (Vec<ItemRecord>, Option<String>) {
        let items = page.files.into_iter().map(Self::parse_file).collect();
        let next = page.next_page_token.filter(|t| !t.is_empty());
        (items, next)
    }
}

// ============================================================================
// Listing functions
// ============================================================================

/// Fetches every item record, following pagination to the end
///
/// # Arguments
///
/// * `client` - A reference to the authenticated [`DriveClient`]
///
/// # Returns
///
/// All items across all pages, folders included, in API order.
///
/// # Errors
///
/// Any page that fails after retries fails the whole listing; items from
/// earlier pages are discarded.
#[instrument(skip(client), fields(page_size = client.page_size()))]
pub async fn list_items(client: &DriveClient) -> Result<Vec<ItemRecord>, DriveError> {
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut page_count: u32 = 0;

    loop {
        page_count += 1;
        let (page_items, next) = list_page(client, page_token.as_deref()).await?;

        debug!(
            page = page_count,
            items = page_items.len(),
            has_next = next.is_some(),
            "Received listing page"
        );

        items.extend(page_items);
        match next {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    debug!(
        total_items = items.len(),
        total_pages = page_count,
        "Listing complete"
    );
    Ok(items)
}

/// Fetches a single listing page
///
/// # Arguments
///
/// * `client` - A reference to the authenticated [`DriveClient`]
/// * `page_token` - `None` for the first page, else the previous page's token
///
/// # Returns
///
/// The page's items and the token of the following page, if any.
pub async fn list_page(
    client: &DriveClient,
    page_token: Option<&str>,
) -> Result<(Vec<ItemRecord>, Option<String>), DriveError> {
    let page_size = client.page_size().to_string();
    let mut query: Vec<(&str, &str)> = vec![
        ("q", LIST_QUERY),
        ("corpora", "user"),
        ("includeItemsFromAllDrives", "true"),
        ("supportsAllDrives", "true"),
        ("pageSize", page_size.as_str()),
        ("fields", LIST_FIELDS),
    ];
    if let Some(token) = page_token {
        query.push(("pageToken", token));
    }

    let request = client.request(Method::GET, FILES_PATH).query(&query);
    let response = client.execute_with_retry(request).await?;

    let raw: FilesListResponse = response
        .json()
        .await
        .map_err(|e| DriveError::InvalidResponse(format!("listing page: {}", e)))?;

    Ok(ListingParser::parse_page(raw))
}

// ============================================================================
// Tests
// ============================================================================
