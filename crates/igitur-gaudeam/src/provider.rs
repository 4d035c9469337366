//! GaudeamDriveProvider - IRemoteDrive implementation for the Gaudeam drive
//!
//! Wraps the [`GaudeamClient`] drive requests and converts wire inodes into
//! port-level [`Entry`] values.
//!
//! ## Design Notes
//!
//! - Files are matched by their `download_name` (the original file name with
//!   extension), folders by their display name.
//! - Inodes of other types (links, polls, ...) are not part of the tree.
//! - `create_folder` lists the parent first, so creating an existing folder
//!   returns its id instead of producing a second folder of the same name.
//! - Deleting a folder removes its whole subtree on the service side.

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use igitur_core::domain::entry::{Entry, EntryIdentity, EntryKind};
use igitur_core::domain::newtypes::RemoteId;
use igitur_core::ports::remote_drive::IRemoteDrive;

use crate::client::GaudeamClient;
use crate::drive::{classify_type, Inode, InodeClass};

/// Default number of inodes requested per listing page
pub const DEFAULT_PAGE_SIZE: u32 = 80;

/// Remote drive adapter for one Gaudeam instance
pub struct GaudeamDriveProvider {
    client: GaudeamClient,
    page_size: u32,
}

impl GaudeamDriveProvider {
    pub fn new(client: GaudeamClient) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn client(&self) -> &GaudeamClient {
        &self.client
    }
}

/// Converts a listed inode into an entry of `parent`
///
/// Returns `None` for inode types outside the tree and for names that
/// cannot be addressed inside a folder.
fn inode_to_entry(inode: Inode, parent: &RemoteId) -> Option<Entry> {
    let kind = match inode.class() {
        InodeClass::Folder => EntryKind::Folder,
        InodeClass::File => EntryKind::File,
        InodeClass::Other => {
            debug!(id = %inode.id, kind = %inode.kind, "Ignoring inode type");
            return None;
        }
    };

    let name = inode.entry_name()?.to_string();
    let id = match RemoteId::new(inode.id.clone()) {
        Ok(id) => id,
        Err(e) => {
            warn!(id = %inode.id, error = %e, "Ignoring inode with invalid id");
            return None;
        }
    };

    match Entry::new(name, kind, EntryIdentity::Remote(id)) {
        Ok(entry) => {
            let entry = entry.with_parent(EntryIdentity::Remote(parent.clone()));
            Some(match inode.file_size {
                Some(size) if kind == EntryKind::File => entry.with_size(size),
                _ => entry,
            })
        }
        Err(e) => {
            warn!(id = %inode.id, error = %e, "Ignoring inode with unusable name");
            None
        }
    }
}

#[async_trait::async_trait]
impl IRemoteDrive for GaudeamDriveProvider {
    #[instrument(skip(self), fields(id = %id))]
    async fn get_folder(&self, id: &RemoteId) -> Result<Entry> {
        let props = self.client.folder_properties(id.as_str()).await?;

        if let Some(kind) = props.kind.as_deref() {
            if classify_type(kind) != InodeClass::Folder {
                anyhow::bail!("Remote item {id} is a {kind}, not a folder");
            }
        }

        let name = props.name.unwrap_or_else(|| id.to_string());
        Ok(Entry::root(name, EntryIdentity::Remote(id.clone())))
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn list_folder(&self, id: &RemoteId) -> Result<Vec<Entry>> {
        let inodes = self.client.list_folder_all(id.as_str(), self.page_size).await?;
        Ok(inodes
            .into_iter()
            .filter_map(|inode| inode_to_entry(inode, id))
            .collect())
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn count_children(&self, id: &RemoteId) -> Result<usize> {
        Ok(self.client.list_folder_all(id.as_str(), self.page_size).await?.len())
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn fetch_file(&self, id: &RemoteId) -> Result<Vec<u8>> {
        self.client.download_file(id.as_str()).await
    }

    #[instrument(skip(self), fields(parent = %parent))]
    async fn create_folder(&self, parent: &RemoteId, name: &str) -> Result<RemoteId> {
        let existing = self.list_folder(parent).await?;
        if let Some(folder) = existing
            .into_iter()
            .find(|e| e.is_folder() && e.name == name)
        {
            debug!(name, "Folder already exists");
            if let EntryIdentity::Remote(id) = folder.identity {
                return Ok(id);
            }
        }

        let props = self.client.folder_properties(parent.as_str()).await?;
        let id = self.client.create_folder(&props, name).await?;
        RemoteId::new(id).context("Created folder has an invalid id")
    }

    #[instrument(skip(self, data), fields(parent = %parent, size = data.len()))]
    async fn upload_file(&self, parent: &RemoteId, name: &str, data: Vec<u8>) -> Result<RemoteId> {
        let id = self.client.upload_file(parent.as_str(), name, data).await?;
        RemoteId::new(id).context("Uploaded file has an invalid id")
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn delete_folder(&self, id: &RemoteId) -> Result<()> {
        self.client.delete_folder(id.as_str()).await
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn delete_file(&self, id: &RemoteId) -> Result<()> {
        self.client.delete_uploaded_file(id.as_str()).await
    }
}
