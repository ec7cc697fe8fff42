//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! such as rejecting malformed item records or session tokens.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An item record is missing a required field
    #[error("Invalid item record: {0}")]
    InvalidItem(String),

    /// A session token is missing a required field
    #[error("Invalid session token: {0}")]
    InvalidSession(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
