//! Source and destination views of a transfer
//!
//! The engine walks a [`SourceTree`] and mirrors it into a
//! [`DestinationTree`]. Both are addressed by [`EntryIdentity`], so the same
//! walk drives downloads (remote → local), uploads (local → remote) and
//! any other pairing, such as a flat list of event media.

use std::sync::Arc;

use anyhow::{anyhow, Result};

use igitur_core::domain::entry::{Entry, EntryIdentity};
use igitur_core::domain::newtypes::{LocalPath, RemoteId};
use igitur_core::ports::local_tree::ILocalTree;
use igitur_core::ports::remote_drive::IRemoteDrive;

/// Side a transfer reads from
#[async_trait::async_trait]
pub trait SourceTree: Send + Sync {
    /// Children of a source folder, listed once per walk
    async fn list(&self, folder: &EntryIdentity) -> Result<Vec<Entry>>;

    /// Content to send for a source file
    async fn read(&self, file: &Entry) -> Result<Vec<u8>>;

    /// Whether a file takes part in the transfer at all
    ///
    /// Rejected files are counted as excluded and never read.
    fn admits(&self, _file: &Entry) -> bool {
        true
    }
}

/// Side a transfer writes to
#[async_trait::async_trait]
pub trait DestinationTree: Send + Sync {
    /// Snapshot of a destination folder's children
    async fn list(&self, folder: &EntryIdentity) -> Result<Vec<Entry>>;

    /// Create subfolder `name` of `parent`, or return the existing one
    async fn ensure_folder(&self, parent: &EntryIdentity, name: &str) -> Result<EntryIdentity>;

    /// Store `data` as file `name` in `parent`
    ///
    /// The file must not be visible under `name` before it is complete.
    async fn write(&self, parent: &EntryIdentity, name: &str, data: Vec<u8>) -> Result<()>;
}

fn remote_id(identity: &EntryIdentity) -> Result<&RemoteId> {
    identity
        .as_remote()
        .ok_or_else(|| anyhow!("{identity} is not a remote entry"))
}

fn local_path(identity: &EntryIdentity) -> Result<&LocalPath> {
    identity
        .as_local()
        .ok_or_else(|| anyhow!("{identity} is not a local entry"))
}

// ============================================================================
// RemoteTree
// ============================================================================

/// The remote drive as either side of a transfer
#[derive(Clone)]
pub struct RemoteTree {
    drive: Arc<dyn IRemoteDrive>,
}

impl RemoteTree {
    pub fn new(drive: Arc<dyn IRemoteDrive>) -> Self {
        Self { drive }
    }
}

#[async_trait::async_trait]
impl SourceTree for RemoteTree {
    async fn list(&self, folder: &EntryIdentity) -> Result<Vec<Entry>> {
        self.drive.list_folder(remote_id(folder)?).await
    }

    async fn read(&self, file: &Entry) -> Result<Vec<u8>> {
        self.drive.fetch_file(remote_id(&file.identity)?).await
    }
}

#[async_trait::async_trait]
impl DestinationTree for RemoteTree {
    async fn list(&self, folder: &EntryIdentity) -> Result<Vec<Entry>> {
        self.drive.list_folder(remote_id(folder)?).await
    }

    async fn ensure_folder(&self, parent: &EntryIdentity, name: &str) -> Result<EntryIdentity> {
        let id = self.drive.create_folder(remote_id(parent)?, name).await?;
        Ok(EntryIdentity::Remote(id))
    }

    async fn write(&self, parent: &EntryIdentity, name: &str, data: Vec<u8>) -> Result<()> {
        self.drive.upload_file(remote_id(parent)?, name, data).await?;
        Ok(())
    }
}

// ============================================================================
// LocalTree
// ============================================================================

/// The local filesystem as either side of a transfer
#[derive(Clone)]
pub struct LocalTree {
    fs: Arc<dyn ILocalTree>,
}

impl LocalTree {
    pub fn new(fs: Arc<dyn ILocalTree>) -> Self {
        Self { fs }
    }

    pub fn fs(&self) -> &Arc<dyn ILocalTree> {
        &self.fs
    }
}

#[async_trait::async_trait]
impl SourceTree for LocalTree {
    async fn list(&self, folder: &EntryIdentity) -> Result<Vec<Entry>> {
        self.fs.list_folder(local_path(folder)?).await
    }

    async fn read(&self, file: &Entry) -> Result<Vec<u8>> {
        self.fs.read_file(local_path(&file.identity)?).await
    }
}

#[async_trait::async_trait]
impl DestinationTree for LocalTree {
    async fn list(&self, folder: &EntryIdentity) -> Result<Vec<Entry>> {
        self.fs.list_folder(local_path(folder)?).await
    }

    async fn ensure_folder(&self, parent: &EntryIdentity, name: &str) -> Result<EntryIdentity> {
        let path = self.fs.mkdir(local_path(parent)?, name).await?;
        Ok(EntryIdentity::Local(path))
    }

    async fn write(&self, parent: &EntryIdentity, name: &str, data: Vec<u8>) -> Result<()> {
        self.fs
            .write_file_atomic(local_path(parent)?, name, &data)
            .await?;
        Ok(())
    }
}
