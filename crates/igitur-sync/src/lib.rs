//! igitur Sync - One-way tree reconciliation
//!
//! Provides:
//! - Resumable, idempotent download and upload of folder trees
//! - Image recompression ahead of upload
//! - Event media downloads grouped by uploader and by event
//! - Cleanup of duplicate entries and empty folders on the remote drive
//!
//! ## Modules
//!
//! - [`engine`] - [`ReconciliationEngine`], the depth-first walk and skip logic
//! - [`tree`] - Source/destination views over the remote drive and local disk
//! - [`filesystem`] - Local filesystem adapter (atomic writes via partial files)
//! - [`preprocess`] - [`ImagePreprocessor`] and the compressed upload source
//! - [`compressor`] - `image`-crate backed compressor
//! - [`events`] - [`EventMediaGrouper`] for event media downloads
//! - [`maintenance`] - [`RemoteCleaner`], duplicate and empty folder cleanup

pub mod compressor;
pub mod engine;
pub mod events;
pub mod filesystem;
pub mod maintenance;
pub mod preprocess;
pub mod tree;

#[cfg(test)]
pub(crate) mod testing;

pub use compressor::ImageCrateCompressor;
pub use engine::{EngineOptions, ReconciliationEngine};
pub use events::{EventMediaGrouper, EventSyncReport};
pub use filesystem::LocalFileSystemAdapter;
pub use maintenance::RemoteCleaner;
pub use preprocess::{ImagePreprocessor, PreparedImage};

use thiserror::Error;

/// Errors that abort a transfer run
///
/// Per-entry problems never surface here; they are collected in the
/// run's `SyncReport` instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A transfer root is missing, not a folder, or on the wrong side
    #[error("Invalid root {root}: {reason}")]
    InvalidRoot { root: String, reason: String },

    /// No usable session; the user has to log in again
    #[error("Not logged in: {0}. Run `igitur login` first")]
    Auth(String),

    /// A single entry could not be transferred
    #[error("Transfer of {path} failed: {reason}")]
    Transfer { path: String, reason: String },

    /// Several source entries share one name
    #[error("Name collision at {0}")]
    NameCollision(String),

    /// An I/O error occurred outside of a single entry's transfer
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An event window that does not fit the calendar's date range
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    /// A domain-level error propagated from igitur-core
    #[error("Domain error: {0}")]
    Domain(#[from] igitur_core::domain::DomainError),

    #[error(transparent)]
    Other(anyhow::Error),
}

impl From<anyhow::Error> for SyncError {
    /// Unwraps a `SyncError` carried by `err` and turns a rejected session
    /// into [`SyncError::Auth`]
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<SyncError>() {
            Ok(sync) => sync,
            Err(err) if engine::is_auth_error(&err) => Self::Auth(format!("{err:#}")),
            Err(err) => Self::Other(err),
        }
    }
}

impl SyncError {
    pub fn invalid_root(root: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidRoot {
            root: root.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the run stopped before any entry was looked at
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Transfer { .. } | Self::NameCollision(_))
    }
}
