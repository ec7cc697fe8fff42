//! Content fetcher
//!
//! Fetches one item into its destination directory. Regular files are
//! downloaded byte for byte (`alt=media`), native documents go through the
//! export endpoint. Content is streamed into a `.part` file next to the
//! final path and renamed into place only after it is fully written and
//! synced, so a final path never holds partial content.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use drivemirror_drive::client::DriveClient;
//! use drivemirror_drive::fetch;
//! # use drivemirror_core::domain::ItemRecord;
//!
//! # async fn example(item: ItemRecord) -> anyhow::Result<()> {
//! let client = DriveClient::new("access-token");
//! let outcome = fetch::fetch(&client, &item, Path::new("/tmp/mirror/My Drive")).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use drivemirror_core::domain::item::{ItemKind, ItemRecord};
use drivemirror_core::domain::message::FetchOutcome;
use drivemirror_core::domain::sanitize::sanitize_name;
use futures_util::{Stream, StreamExt};
use reqwest::Method;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};

use crate::client::DriveClient;
use crate::export::{local_file_name, transfer_mode, TransferMode};
use crate::DriveError;

/// Write buffer size for streamed content
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Per-item transfer failure
///
/// Never fatal for a run: the scheduler turns it into a single
/// `Error downloading <name>: <reason>` message.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The connection failed while sending or streaming
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// An API failure without a status code
    #[error("{0}")]
    Api(DriveError),

    /// Writing or renaming the local file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The destination path could not be determined
    #[error("invalid path: {0}")]
    Path(String),
}

impl From<DriveError> for TransferError {
    fn from(err: DriveError) -> Self {
        match err {
            DriveError::Network(e) => Self::Http(e),
            DriveError::Status { status, message } => Self::Status {
                status,
                body: message,
            },
            other => match other.status_code() {
                Some(status) => Self::Status {
                    status,
                    body: other.to_string(),
                },
                None => Self::Api(other),
            },
        }
    }
}

/// Temporary path content is streamed into before publication
///
/// `.<item id>.part` in the same directory as `final_path`. The final rename
/// never crosses filesystems, two items with the same name never share a
/// temporary file, and the name stays short however long the final name
/// is.
pub fn part_path(final_path: &Path, item_id: &str) -> PathBuf {
    final_path.with_file_name(format!(".{}.part", sanitize_name(item_id)))
}

/// Fetches one item into `destination_dir`
///
/// # Arguments
/// * `client` - Authenticated client of the calling execution unit
/// * `item` - A non-folder item
/// * `destination_dir` - Existing directory that receives the file
///
/// # Returns
/// - [`FetchOutcome::SkippedExists`] if the final path already exists; no
///   request is made
/// - [`FetchOutcome::SkippedNoExport`] for native documents with no export
///   format; no request is made
/// - [`FetchOutcome::Downloaded`] once the content is published
///
/// # Errors
/// Any failure leaves the final path untouched and removes the `.part`
/// file (best effort).
#[instrument(skip(client, item, destination_dir), fields(id = %item.id, kind = ?item.kind))]
pub async fn fetch(
    client: &DriveClient,
    item: &ItemRecord,
    destination_dir: &Path,
) -> Result<FetchOutcome, TransferError> {
    if item.kind == ItemKind::Folder {
        return Err(TransferError::Path(format!(
            "'{}' is a folder and has no content",
            item.name
        )));
    }

    let Some(mode) = transfer_mode(item) else {
        debug!(mime_type = %item.mime_type, "No export format");
        return Ok(FetchOutcome::SkippedNoExport(item.name.clone()));
    };

    let final_path = destination_dir.join(local_file_name(item, &mode));
    if tokio::fs::try_exists(&final_path).await? {
        debug!(path = %final_path.display(), "Already present");
        return Ok(FetchOutcome::SkippedExists(final_path));
    }

    let request = match &mode {
        TransferMode::Media => client
            .request(Method::GET, &format!("/files/{}", item.id))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")]),
        TransferMode::Export(format) => client
            .request(Method::GET, &format!("/files/{}/export", item.id))
            .query(&[("mimeType", format.mime_type)]),
    };

    let response = client.execute_with_retry(request).await?;

    let part = part_path(&final_path, &item.id);
    let bytes = publish_stream(response.bytes_stream(), &part, &final_path).await?;

    debug!(path = %final_path.display(), bytes, "Downloaded");
    Ok(FetchOutcome::Downloaded(final_path))
}

/// Streams `body` into `part`, then renames it over `final_path`
///
/// On any error the `.part` file is removed and `final_path` is not
/// created.
///
/// # Returns
/// Number of bytes written.
pub async fn publish_stream<S, B, E>(
    body: S,
    part: &Path,
    final_path: &Path,
) -> Result<u64, TransferError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    TransferError: From<E>,
{
    let result = async {
        let written = write_part(body, part).await?;
        tokio::fs::rename(part, final_path).await?;
        Ok::<u64, TransferError>(written)
    }
    .await;

    if result.is_err() {
        discard_part(part).await;
    }
    result
}

async fn write_part<S, B, E>(body: S, part: &Path) -> Result<u64, TransferError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    TransferError: From<E>,
{
    let file = tokio::fs::File::create(part).await?;
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut body = std::pin::pin!(body);
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        writer.write_all(chunk).await?;
        written += chunk.len() as u64;
    }

    writer.flush().await?;
    writer.get_ref().sync_all().await?;
    Ok(written)
}

async fn discard_part(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => debug!(path = %part.display(), "Removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %part.display(), error = %e, "Failed to remove partial file"),
    }
}
