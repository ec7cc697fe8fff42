//! Folder index for local path reconstruction
//!
//! The remote store only records each item's parent id. A [`FolderIndex`]
//! maps every folder id to its name and parent so an item's local directory
//! can be rebuilt by walking the parent chain.
//!
//! ## Usage
//!
//! ```rust
//! use drivemirror_core::domain::{FolderIndex, ItemRecord};
//!
//! let folder = ItemRecord::new("f1", "Projects", "application/vnd.google-apps.folder").unwrap();
//! let file = ItemRecord::new("x1", "plan.txt", "text/plain").unwrap().with_parent("f1");
//!
//! let index = FolderIndex::from_items(&[folder, file.clone()]);
//! assert_eq!(index.local_segments(&file), vec!["Projects".to_string()]);
//! ```

use std::collections::{HashMap, HashSet};

use super::item::ItemRecord;
use super::sanitize::sanitize_name;

/// Segment used for shared items whose ancestry cannot be resolved
pub const SHARED_FALLBACK: &str = "Shared";

/// Segment used for owned items whose ancestry cannot be resolved
pub const MY_DRIVE_FALLBACK: &str = "My Drive";

#[derive(Debug, Clone, PartialEq, Eq)]
struct FolderEntry {
    name: String,
    parent_id: Option<String>,
}

/// Read-only map of folder id to `(name, parent_id)`
///
/// Built once per run and shared between execution units behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct FolderIndex {
    folders: HashMap<String, FolderEntry>,
}

impl FolderIndex {
    /// Builds the index from every folder record in `items`
    ///
    /// Non-folder records are ignored.
    pub fn from_items(items: &[ItemRecord]) -> Self {
        let folders = items
            .iter()
            .filter(|item| item.is_folder())
            .map(|item| {
                (
                    item.id.clone(),
                    FolderEntry {
                        name: item.name.clone(),
                        parent_id: item.parent_id.clone(),
                    },
                )
            })
            .collect();
        Self { folders }
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn contains(&self, folder_id: &str) -> bool {
        self.folders.contains_key(folder_id)
    }

    /// Computes the sanitized directory segments for an item, root first
    ///
    /// Walks from the item's parent towards the root and stops at the first
    /// parent that is absent, not indexed, or already visited. When no
    /// segment resolves, returns a single fallback segment: `"Shared"` for
    /// shared items and `"My Drive"` otherwise.
    ///
    /// Performs no I/O and always returns at least one segment.
    pub fn local_segments(&self, item: &ItemRecord) -> Vec<String> {
        let mut segments = Vec::new();
        let mut visited = HashSet::new();
        let mut current = item.parent_id.as_deref();

        while let Some(parent_id) = current {
            if !visited.insert(parent_id) {
                break;
            }
            let Some(entry) = self.folders.get(parent_id) else {
                break;
            };
            segments.push(sanitize_name(&entry.name));
            current = entry.parent_id.as_deref();
        }

        if segments.is_empty() {
            let fallback = if item.shared {
                SHARED_FALLBACK
            } else {
                MY_DRIVE_FALLBACK
            };
            return vec![fallback.to_string()];
        }

        segments.reverse();
        segments
    }
}
