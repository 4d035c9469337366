//! Local tree port (driven/secondary port)
//!
//! This module defines the interface for the local side of a transfer:
//! directory listing, name lookup, directory creation and atomic writes.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - Writes are atomic: a file appears under its final name only once its
//!   content is complete, so an interrupted run never leaves a truncated
//!   file that a later run would skip as "already present".
//! - In-progress writes are never reported by `list_folder` or `exists`.

use chrono::{DateTime, Utc};

use crate::domain::entry::Entry;
use crate::domain::newtypes::LocalPath;

// ============================================================================
// FileSystemState
// ============================================================================

/// Snapshot of a path's state on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSystemState {
    /// Whether the file/directory exists on disk
    pub exists: bool,
    /// Whether this is a regular file (false for directories and other types)
    pub is_file: bool,
    /// Size in bytes (0 for directories or non-existent files)
    pub size: u64,
    /// Last modification time (None if not available or file doesn't exist)
    pub modified: Option<DateTime<Utc>>,
}

impl FileSystemState {
    /// Returns a state representing a non-existent path
    pub fn not_found() -> Self {
        Self {
            exists: false,
            is_file: false,
            size: 0,
            modified: None,
        }
    }

    /// Returns true if the file exists and is a regular file
    pub fn is_regular_file(&self) -> bool {
        self.exists && self.is_file
    }

    /// Returns true if the path exists and is a directory
    pub fn is_directory(&self) -> bool {
        self.exists && !self.is_file
    }
}

// ============================================================================
// ILocalTree trait
// ============================================================================

/// Port trait for local tree operations
///
/// All paths are `LocalPath` instances, which are guaranteed to be absolute.
/// Names passed alongside a directory path are single components.
#[async_trait::async_trait]
pub trait ILocalTree: Send + Sync {
    /// Lists the direct children of a directory
    ///
    /// Entries carry `EntryIdentity::Local` identities and the listed
    /// directory as parent. Hidden partial files of in-progress writes are
    /// omitted.
    async fn list_folder(&self, path: &LocalPath) -> anyhow::Result<Vec<Entry>>;

    /// Returns true if `dir` contains a child named `name`
    async fn exists(&self, dir: &LocalPath, name: &str) -> anyhow::Result<bool>;

    /// Creates the subdirectory `name` in `dir`
    ///
    /// Succeeds without change if the directory already exists; fails if a
    /// non-directory of that name is in the way.
    ///
    /// # Returns
    /// The path of the directory
    async fn mkdir(&self, dir: &LocalPath, name: &str) -> anyhow::Result<LocalPath>;

    /// Writes `data` to `dir/name` atomically
    ///
    /// # Returns
    /// The path of the written file
    async fn write_file_atomic(
        &self,
        dir: &LocalPath,
        name: &str,
        data: &[u8],
    ) -> anyhow::Result<LocalPath>;

    /// Reads the entire contents of a file
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be read
    async fn read_file(&self, path: &LocalPath) -> anyhow::Result<Vec<u8>>;

    /// Gets the current state of a file or directory
    ///
    /// Returns `FileSystemState::not_found()` if the path doesn't exist
    /// (does not return an error for missing paths).
    async fn get_state(&self, path: &LocalPath) -> anyhow::Result<FileSystemState>;

    /// Creates a directory and all parent directories as needed
    ///
    /// This is equivalent to `mkdir -p` behavior.
    async fn create_dir_all(&self, path: &LocalPath) -> anyhow::Result<()>;
}
