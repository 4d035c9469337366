//! Remote drive port (driven/secondary port)
//!
//! This module defines the interface for the remote side of a transfer:
//! a tree of folders and files addressed by [`RemoteId`].
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification.
//! - Uses `#[async_trait]` for async trait methods.
//! - Listings return port-level [`Entry`] values whose identity is always
//!   `EntryIdentity::Remote` and whose parent is the listed folder.

use crate::domain::entry::Entry;
use crate::domain::newtypes::RemoteId;

/// Remote folder tree operations
#[async_trait::async_trait]
pub trait IRemoteDrive: Send + Sync {
    /// Resolve a folder id to its entry
    ///
    /// Used to validate transfer roots. Fails if the id does not exist or
    /// names a file.
    async fn get_folder(&self, id: &RemoteId) -> anyhow::Result<Entry>;

    /// List the direct children of a folder
    ///
    /// Implementations page through the listing internally; callers get the
    /// complete set of children.
    async fn list_folder(&self, id: &RemoteId) -> anyhow::Result<Vec<Entry>>;

    /// Number of children of any type, including those `list_folder` leaves
    /// out because they are not part of the file tree
    async fn count_children(&self, id: &RemoteId) -> anyhow::Result<usize>;

    /// Fetch the full content of a file
    async fn fetch_file(&self, id: &RemoteId) -> anyhow::Result<Vec<u8>>;

    /// Create a subfolder under `parent`
    ///
    /// Idempotent: if a folder named `name` already exists under `parent`,
    /// its id is returned and nothing is created.
    ///
    /// # Arguments
    /// * `parent` - Folder to create the subfolder in
    /// * `name` - Name of the new folder
    ///
    /// # Returns
    /// The id of the (new or existing) folder
    async fn create_folder(&self, parent: &RemoteId, name: &str) -> anyhow::Result<RemoteId>;

    /// Upload `data` as a new file named `name` in `parent`
    ///
    /// The file must not become visible under `name` until the upload is
    /// complete.
    ///
    /// # Returns
    /// The id of the created file
    async fn upload_file(
        &self,
        parent: &RemoteId,
        name: &str,
        data: Vec<u8>,
    ) -> anyhow::Result<RemoteId>;

    /// Delete a folder together with everything below it
    async fn delete_folder(&self, id: &RemoteId) -> anyhow::Result<()>;

    /// Delete a single file
    async fn delete_file(&self, id: &RemoteId) -> anyhow::Result<()>;
}
