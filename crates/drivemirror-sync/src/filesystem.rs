//! Local directory materialization
//!
//! Maps an item onto its destination directory under the mirror root and
//! makes sure that directory exists. The path itself is computed by
//! [`FolderIndex::local_segments`], which is pure; this module only adds
//! the filesystem side.

use std::io;
use std::path::{Path, PathBuf};

use drivemirror_core::domain::folder_index::FolderIndex;
use drivemirror_core::domain::item::ItemRecord;
use tracing::{debug, instrument};

/// Directory under `root` that receives `item`
///
/// Pure: no directory is created.
pub fn destination_dir(item: &ItemRecord, index: &FolderIndex, root: &Path) -> PathBuf {
    let mut dir = root.to_path_buf();
    dir.extend(index.local_segments(item));
    dir
}

/// Resolves and creates the destination directory of `item`
///
/// Creation is idempotent and safe to race with other tasks resolving the
/// same directory.
///
/// # Returns
/// The directory, and `true` if it did not exist before this call.
#[instrument(skip(item, index, root), fields(id = %item.id))]
pub async fn resolve_path(
    item: &ItemRecord,
    index: &FolderIndex,
    root: &Path,
) -> io::Result<(PathBuf, bool)> {
    let dir = destination_dir(item, index, root);

    if tokio::fs::try_exists(&dir).await? {
        return Ok((dir, false));
    }

    tokio::fs::create_dir_all(&dir).await?;
    debug!(path = %dir.display(), "Created directory");
    Ok((dir, true))
}
