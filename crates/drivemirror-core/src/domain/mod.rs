//! Domain values for the mirroring engine
//!
//! Everything in this module is plain data plus pure functions. Directory
//! creation and network transfers live in the adapter crates.

pub mod errors;
pub mod folder_index;
pub mod item;
pub mod message;
pub mod progress;
pub mod sanitize;
pub mod session;

pub use errors::DomainError;
pub use folder_index::FolderIndex;
pub use item::{ItemKind, ItemRecord, TransferTask};
pub use message::{FetchOutcome, MirrorMessage};
pub use progress::ProgressState;
pub use sanitize::sanitize_name;
pub use session::{SessionEndpoints, SessionToken};
