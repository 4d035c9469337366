//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalTree`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: content goes to a hidden partial file in the target
//!   directory first and is renamed into place once complete and synced, so
//!   the final name never points at a truncated file.
//! - **Partial files are invisible**: names of the form
//!   `.igitur-<uuid>.partial` are left out of listings and existence checks.
//! - **Stable listings**: children are returned sorted by name.

use std::io::ErrorKind;

use anyhow::{bail, Context};
use chrono::DateTime;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use igitur_core::domain::entry::{Entry, EntryIdentity, EntryKind};
use igitur_core::domain::newtypes::LocalPath;
use igitur_core::ports::local_tree::{FileSystemState, ILocalTree};

const PARTIAL_PREFIX: &str = ".igitur-";
const PARTIAL_SUFFIX: &str = ".partial";

/// Whether `name` is the hidden partial file of an in-progress write
pub fn is_partial_file(name: &str) -> bool {
    name.starts_with(PARTIAL_PREFIX) && name.ends_with(PARTIAL_SUFFIX)
}

fn partial_file_name() -> String {
    format!("{PARTIAL_PREFIX}{}{PARTIAL_SUFFIX}", uuid::Uuid::new_v4())
}

// ============================================================================
// LocalFileSystemAdapter
// ============================================================================

/// Adapter that bridges the [`ILocalTree`] port to the real filesystem.
///
/// This is a zero-sized struct because all operations derive their context
/// from the [`LocalPath`] arguments.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl ILocalTree for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(path = %path))]
    async fn list_folder(&self, path: &LocalPath) -> anyhow::Result<Vec<Entry>> {
        let mut dir = tokio::fs::read_dir(path.as_path())
            .await
            .with_context(|| format!("Failed to read directory: {path}"))?;

        let mut entries = Vec::new();
        while let Some(child) = dir.next_entry().await? {
            let raw_name = child.file_name();
            let Some(name) = raw_name.to_str() else {
                warn!(name = ?raw_name, "Skipping non UTF-8 name");
                continue;
            };
            if is_partial_file(name) {
                continue;
            }

            // Follows symlinks, so a link to a directory is a folder
            let metadata = match tokio::fs::metadata(child.path()).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(name, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            let kind = if metadata.is_dir() {
                EntryKind::Folder
            } else {
                EntryKind::File
            };

            let child_path = path.join(name)?;
            let mut entry = Entry::new(name, kind, EntryIdentity::Local(child_path))?
                .with_parent(EntryIdentity::Local(path.clone()));
            if kind == EntryKind::File {
                entry = entry.with_size(metadata.len());
            }
            entries.push(entry);
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = entries.len(), "listed directory");
        Ok(entries)
    }

    async fn exists(&self, dir: &LocalPath, name: &str) -> anyhow::Result<bool> {
        if is_partial_file(name) {
            return Ok(false);
        }
        let target = dir.join(name)?;
        match tokio::fs::symlink_metadata(target.as_path()).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to stat {target}")),
        }
    }

    #[instrument(skip(self), fields(dir = %dir))]
    async fn mkdir(&self, dir: &LocalPath, name: &str) -> anyhow::Result<LocalPath> {
        let target = dir.join(name)?;
        match tokio::fs::create_dir(target.as_path()).await {
            Ok(()) => {
                debug!(name, "directory created");
                Ok(target)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let metadata = tokio::fs::metadata(target.as_path()).await?;
                if !metadata.is_dir() {
                    bail!("Cannot create directory {target}: a file of that name exists");
                }
                Ok(target)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to create directory {target}")),
        }
    }

    #[instrument(skip(self, data), fields(dir = %dir, bytes = data.len()))]
    async fn write_file_atomic(
        &self,
        dir: &LocalPath,
        name: &str,
        data: &[u8],
    ) -> anyhow::Result<LocalPath> {
        let target = dir.join(name)?;
        // Same directory, so the rename stays on one filesystem
        let tmp_path = dir.as_path().join(partial_file_name());

        debug!(?tmp_path, "writing to partial file");
        let written = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp_path, target.as_path()).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| format!("Failed to write {target}"));
        }

        debug!("write complete");
        Ok(target)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn read_file(&self, path: &LocalPath) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(path.as_path())
            .await
            .with_context(|| format!("Failed to read {path}"))?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    async fn get_state(&self, path: &LocalPath) -> anyhow::Result<FileSystemState> {
        let metadata = match tokio::fs::metadata(path.as_path()).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(FileSystemState::not_found());
            }
            Err(e) => return Err(e.into()),
        };

        let modified = metadata.modified().ok().and_then(|st| {
            st.duration_since(std::time::UNIX_EPOCH)
                .ok()
                .and_then(|dur| DateTime::from_timestamp(dur.as_secs() as i64, dur.subsec_nanos()))
        });

        Ok(FileSystemState {
            exists: true,
            is_file: metadata.is_file(),
            size: if metadata.is_file() { metadata.len() } else { 0 },
            modified,
        })
    }

    async fn create_dir_all(&self, path: &LocalPath) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path.as_path())
            .await
            .with_context(|| format!("Failed to create {path}"))
    }
}

// ============================================================================
// Unit tests
// ============================================================================
