//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! validation of identifiers and paths, and parsing of service data.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid entry name (empty, contains a separator, or a dot segment)
    #[error("Invalid entry name: {0}")]
    InvalidName(String),

    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Date string in none of the accepted formats
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
