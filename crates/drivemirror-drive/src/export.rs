//! Export mapping for native documents
//!
//! Native (server-side editable) documents have no downloadable bytes; they
//! must be converted by the export endpoint. Documents, spreadsheets and
//! presentations map to their Office Open XML equivalents. Types the export
//! endpoint cannot convert map to nothing, and every other native type is
//! exported as PDF.

use drivemirror_core::domain::item::{ItemKind, ItemRecord, NATIVE_MIME_PREFIX};
use drivemirror_core::domain::sanitize::sanitize_name;

/// Target format of an export request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// MIME type passed as `mimeType` to the export endpoint
    pub mime_type: &'static str,
    /// Extension appended to the local file name, dot included
    pub extension: &'static str,
}

pub const DOCX: ExportFormat = ExportFormat {
    mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    extension: ".docx",
};

pub const XLSX: ExportFormat = ExportFormat {
    mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    extension: ".xlsx",
};

pub const PPTX: ExportFormat = ExportFormat {
    mime_type: "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    extension: ".pptx",
};

pub const PDF: ExportFormat = ExportFormat {
    mime_type: "application/pdf",
    extension: ".pdf",
};

/// Native subtypes the export endpoint cannot convert
const UNEXPORTABLE: &[&str] = &[
    "form",
    "shortcut",
    "site",
    "map",
    "fusiontable",
    "drive-sdk",
    "jam",
    "unknown",
    "folder",
];

/// Picks the export format for a native MIME type
///
/// # Returns
/// `None` for non-native types and for native types with no export.
pub fn export_format(mime_type: &str) -> Option<ExportFormat> {
    let subtype = mime_type.strip_prefix(NATIVE_MIME_PREFIX)?;
    match subtype {
        "document" => Some(DOCX),
        "spreadsheet" => Some(XLSX),
        "presentation" => Some(PPTX),
        s if UNEXPORTABLE.contains(&s) => None,
        _ => Some(PDF),
    }
}

/// How an item's content is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferMode {
    /// Download the stored bytes
    Media,
    /// Convert server-side to the given format
    Export(ExportFormat),
}

/// Chooses the transfer mode for an item
///
/// # Returns
/// `None` for folders and for native documents without an export format.
pub fn transfer_mode(item: &ItemRecord) -> Option<TransferMode> {
    match item.kind {
        ItemKind::File => Some(TransferMode::Media),
        ItemKind::NativeDoc => export_format(&item.mime_type).map(TransferMode::Export),
        ItemKind::Folder => None,
    }
}

/// Local file name for an item transferred with `mode`
///
/// Regular files keep their sanitized name. Exported documents get the
/// export extension unless the name already ends with it (ignoring case);
/// the extension is added before sanitizing so a truncated name keeps it.
pub fn local_file_name(item: &ItemRecord, mode: &TransferMode) -> String {
    match mode {
        TransferMode::Media => sanitize_name(&item.name),
        TransferMode::Export(format) => {
            let has_extension = item
                .name
                .to_lowercase()
                .ends_with(&format.extension.to_lowercase());
            if has_extension {
                sanitize_name(&item.name)
            } else {
                sanitize_name(&format!("{}{}", item.name, format.extension))
            }
        }
    }
}
