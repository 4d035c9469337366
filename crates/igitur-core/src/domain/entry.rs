//! Tree entries
//!
//! An [`Entry`] is a single node of either tree taking part in a transfer:
//! a drive inode on the remote side or a file/directory on the local side.
//! The reconciliation engine only ever compares entries by name; identity
//! is what the adapters need to address the node again.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{validate_entry_name, LocalPath, RemoteId};

/// Kind of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Folder => write!(f, "folder"),
        }
    }
}

/// Side-specific address of an entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "side", content = "id", rename_all = "lowercase")]
pub enum EntryIdentity {
    /// Node of the remote drive
    Remote(RemoteId),
    /// Node of the local filesystem
    Local(LocalPath),
}

impl EntryIdentity {
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Remote id, if this identity lives on the remote side
    #[must_use]
    pub fn as_remote(&self) -> Option<&RemoteId> {
        match self {
            Self::Remote(id) => Some(id),
            Self::Local(_) => None,
        }
    }

    /// Local path, if this identity lives on the local side
    #[must_use]
    pub fn as_local(&self) -> Option<&LocalPath> {
        match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        }
    }
}

impl Display for EntryIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(id) => write!(f, "remote:{id}"),
            Self::Local(path) => write!(f, "{path}"),
        }
    }
}

/// A single filesystem-like node on either side of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Name, unique within its parent on each side
    pub name: String,
    pub kind: EntryKind,
    pub identity: EntryIdentity,
    /// Size in bytes when the side reports it
    pub size: Option<u64>,
    /// Identity of the containing folder; `None` for roots
    pub parent: Option<EntryIdentity>,
}

impl Entry {
    /// Create an entry, validating its name
    ///
    /// # Errors
    /// Returns `DomainError::InvalidName` if the name cannot be addressed
    /// inside a folder
    pub fn new(
        name: impl Into<String>,
        kind: EntryKind,
        identity: EntryIdentity,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        validate_entry_name(&name)?;
        Ok(Self {
            name,
            kind,
            identity,
            size: None,
            parent: None,
        })
    }

    /// Root entries carry a display name that is never used for matching,
    /// so it is not validated.
    #[must_use]
    pub fn root(name: impl Into<String>, identity: EntryIdentity) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Folder,
            identity,
            size: None,
            parent: None,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: EntryIdentity) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}
