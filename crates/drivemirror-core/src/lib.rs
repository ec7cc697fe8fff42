//! Drive Mirror Core - Domain types and contracts for the mirroring engine
//!
//! This crate contains the pieces every other crate agrees on:
//! - **Domain values** - `ItemRecord`, `FolderIndex`, `MirrorMessage`, `ProgressState`, `SessionToken`
//! - **Name sanitization** - mapping remote names to filesystem-legal names
//! - **Port definitions** - `CredentialProvider` and `ProgressCallback`
//! - **Configuration** - the YAML configuration file and its validation
//!
//! # Architecture
//!
//! The domain module performs no I/O. Adapter crates (`drivemirror-drive`,
//! `drivemirror-sync`) implement or consume the ports defined here.

pub mod config;
pub mod domain;
pub mod ports;
