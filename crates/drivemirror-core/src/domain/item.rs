//! Remote item records
//!
//! An [`ItemRecord`] is the immutable snapshot of one remote file or folder
//! as returned by the metadata listing. Identity is the remote `id`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// MIME type the remote store uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Prefix shared by all native (server-side editable) MIME types
pub const NATIVE_MIME_PREFIX: &str = "application/vnd.google-apps.";

// ============================================================================
// ItemKind
// ============================================================================

/// What kind of content an item holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Regular binary content, downloaded byte for byte
    File,
    /// A folder; contributes to path reconstruction, never transferred
    Folder,
    /// Proprietary editable document that must be exported server-side
    NativeDoc,
}

impl ItemKind {
    /// Classifies a remote MIME type
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type == FOLDER_MIME_TYPE {
            Self::Folder
        } else if mime_type.starts_with(NATIVE_MIME_PREFIX) {
            Self::NativeDoc
        } else {
            Self::File
        }
    }
}

// ============================================================================
// ItemRecord
// ============================================================================

/// One remote item as seen by the metadata listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Remote identifier
    pub id: String,
    /// Display name (unsanitized)
    pub name: String,
    /// Content kind derived from `mime_type`
    pub kind: ItemKind,
    /// Remote MIME type, used to pick an export format for native documents
    pub mime_type: String,
    /// First parent folder id, if the API reported one
    pub parent_id: Option<String>,
    /// Whether the item is shared with (or not owned by) the account
    pub shared: bool,
    /// Size in bytes (absent for folders and native documents)
    pub size: Option<u64>,
}

impl ItemRecord {
    /// Creates a record, deriving the kind from the MIME type
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidItem`] if `id` is empty.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidItem("empty id".to_string()));
        }
        let mime_type = mime_type.into();
        Ok(Self {
            id,
            name: name.into(),
            kind: ItemKind::from_mime_type(&mime_type),
            mime_type,
            parent_id: None,
            shared: false,
            size: None,
        })
    }

    /// Sets the parent folder id
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Sets the shared flag
    pub fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    /// Sets the size in bytes
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }
}

// ============================================================================
// TransferTask
// ============================================================================

/// A unit of fetch work: one non-folder item plus the directory it lands in
///
/// Created just before dispatch and consumed exactly once.
#[derive(Debug)]
pub struct TransferTask {
    pub item: ItemRecord,
    pub destination_dir: PathBuf,
}
