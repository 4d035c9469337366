//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Entry names
// ============================================================================

/// Validates a single entry name as it appears inside a folder
///
/// A name must be non-empty, must not be `.` or `..`, and must not contain
/// a path separator. Both sides of a transfer address children by name, so
/// a name that fails here cannot be mirrored.
///
/// # Errors
/// Returns `DomainError::InvalidName` describing the offending name
pub fn validate_entry_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::InvalidName(
            "Entry name cannot be empty".to_string(),
        ));
    }
    if name == "." || name == ".." {
        return Err(DomainError::InvalidName(format!(
            "Entry name cannot be a dot segment: {name}"
        )));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(DomainError::InvalidName(format!(
            "Entry name contains a path separator: {name}"
        )));
    }
    Ok(())
}

// ============================================================================
// Path types
// ============================================================================

/// A validated absolute local path
///
/// LocalPath ensures the path is:
/// - Absolute (starts with /)
/// - Normalized (no . or .. components)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct LocalPath(PathBuf);

impl LocalPath {
    /// Create a new LocalPath, validating it is absolute
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is not absolute
    pub fn new(path: PathBuf) -> Result<Self, DomainError> {
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(format!(
                "Path must be absolute: {}",
                path.display()
            )));
        }

        // The path may not exist yet, so no fs::canonicalize()
        let normalized = Self::normalize_path(&path)?;
        Ok(Self(normalized))
    }

    /// Resolve a user-supplied path against the current directory
    ///
    /// # Errors
    /// Returns error if the current directory cannot be determined
    pub fn resolve(path: &Path) -> Result<Self, DomainError> {
        if path.is_absolute() {
            return Self::new(path.to_path_buf());
        }
        let cwd = std::env::current_dir()
            .map_err(|e| DomainError::InvalidPath(format!("Cannot resolve {}: {e}", path.display())))?;
        Self::new(cwd.join(path))
    }

    /// Get the inner path reference
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Convert to owned PathBuf
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Final component of the path, if any
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|n| n.to_str())
    }

    /// Join a single entry name to this path
    ///
    /// # Errors
    /// Returns error if the name is not a valid entry name
    pub fn join(&self, name: &str) -> Result<Self, DomainError> {
        validate_entry_name(name)?;
        Ok(Self(self.0.join(name)))
    }

    /// Normalize a path by resolving . and .. components
    fn normalize_path(path: &Path) -> Result<PathBuf, DomainError> {
        use std::path::Component;

        let mut normalized = PathBuf::new();

        for component in path.components() {
            match component {
                Component::Prefix(p) => normalized.push(p.as_os_str()),
                Component::RootDir => normalized.push("/"),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(DomainError::InvalidPath(
                            "Path escapes root via ..".to_string(),
                        ));
                    }
                }
                Component::Normal(c) => normalized.push(c),
            }
        }

        Ok(normalized)
    }
}

impl Display for LocalPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl TryFrom<PathBuf> for LocalPath {
    type Error = DomainError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<LocalPath> for PathBuf {
    fn from(local_path: LocalPath) -> Self {
        local_path.0
    }
}

impl AsRef<Path> for LocalPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

// ============================================================================
// Service identifiers
// ============================================================================

fn validate_service_id(id: &str) -> Result<(), DomainError> {
    if id.is_empty() {
        return Err(DomainError::InvalidRemoteId(
            "Remote ID cannot be empty".to_string(),
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DomainError::InvalidRemoteId(format!(
            "Remote ID contains invalid characters: {id}"
        )));
    }

    Ok(())
}

/// Identifier of a drive inode (folder, gallery or file)
///
/// Gaudeam uses numeric ids; the type accepts any url-safe token so that
/// ids can be interpolated into request paths without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a new RemoteId
    ///
    /// # Errors
    /// Returns error if the ID format is invalid
    pub fn new(id: String) -> Result<Self, DomainError> {
        validate_service_id(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemoteId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}

/// Identifier of a calendar event
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    /// Create a new EventId
    ///
    /// # Errors
    /// Returns error if the ID format is invalid
    pub fn new(id: String) -> Result<Self, DomainError> {
        validate_service_id(&id)?;
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ordering key: numeric ids compare by value, others lexically after them
    #[must_use]
    pub fn sort_key(&self) -> (u64, &str) {
        (self.0.parse::<u64>().unwrap_or(u64::MAX), self.0.as_str())
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for EventId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0
    }
}

// ============================================================================
// Tests
// ============================================================================
