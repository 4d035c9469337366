//! Transfer classification and run reports
//!
//! Everything in this module is ephemeral: tasks and decisions are derived
//! from live listings on every run and are never persisted. The only output
//! that outlives a walk is the [`SyncReport`] handed back to the caller.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::entry::{Entry, EntryIdentity};

/// Direction of a one-way transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    /// Remote source, local destination
    Download,
    /// Local source, remote destination
    Upload,
}

impl TransferDirection {
    /// Whether `identity` lives on the side this direction reads from
    #[must_use]
    pub fn is_source_side(&self, identity: &EntryIdentity) -> bool {
        match self {
            Self::Download => identity.is_remote(),
            Self::Upload => identity.is_local(),
        }
    }

    /// Whether `identity` lives on the side this direction writes to
    #[must_use]
    pub fn is_destination_side(&self, identity: &EntryIdentity) -> bool {
        match self {
            Self::Download => identity.is_local(),
            Self::Upload => identity.is_remote(),
        }
    }
}

impl Display for TransferDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Upload => write!(f, "upload"),
        }
    }
}

/// Classification of a single source entry against the destination snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipDecision {
    /// A destination entry with the same name exists; nothing to do
    SkipExists,
    /// No destination entry with this name; transfer it
    TransferNew,
    /// Folder: ensure it exists on the destination and recurse
    DescendFolder,
    /// Filtered out before transfer (e.g. not an image on the image path)
    Excluded,
    /// Name shared with a sibling in the source listing
    Ambiguous,
}

/// How to treat several source entries sharing one name in a folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Record every entry of the duplicated name as a failure, transfer none
    #[default]
    Fail,
    /// Keep the first entry's name, rename later ones to `name (2).ext`, ...
    Suffix,
}

impl Display for CollisionPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::Suffix => write!(f, "suffix"),
        }
    }
}

/// A single pending file transfer
///
/// Created when reconciliation finds the destination lacks a matching
/// entry and consumed immediately by the engine.
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub source: Entry,
    pub destination_parent: EntryIdentity,
    pub direction: TransferDirection,
    /// Name the file gets on the destination side
    pub target_name: String,
}

/// Category of a per-entry failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Fetching, writing, reading or pushing the entry failed
    Transfer,
    /// Two or more source entries share the same name
    NameCollision,
}

/// A per-entry failure recorded in the report; the walk continued past it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFailure {
    /// Slash-separated path relative to the source root
    pub path: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl Display for TransferFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Overall outcome of a run that did not abort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Completed,
    CompletedWithFailures,
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::CompletedWithFailures => write!(f, "completed with failures"),
        }
    }
}

/// Summary of a completed reconciliation walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Files written to the destination
    pub transferred: u32,
    /// Files already present on the destination by name
    pub skipped: u32,
    /// Files filtered out before transfer
    pub excluded: u32,
    /// Entries recorded in `failures`
    pub failed: u32,
    /// Destination folders created during the walk
    pub folders_created: u32,
    pub failures: Vec<TransferFailure>,
    /// Wall-clock duration of the walk in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transferred(&mut self) {
        self.transferred += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_excluded(&mut self) {
        self.excluded += 1;
    }

    pub fn record_folder_created(&mut self) {
        self.folders_created += 1;
    }

    /// Record a per-entry failure
    pub fn record_failure(
        &mut self,
        path: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
    ) {
        self.failed += 1;
        self.failures.push(TransferFailure {
            path: path.into(),
            kind,
            reason: reason.into(),
        });
    }

    /// Add another report's counters and failures to this one
    pub fn merge(&mut self, other: SyncReport) {
        self.transferred += other.transferred;
        self.skipped += other.skipped;
        self.excluded += other.excluded;
        self.failed += other.failed;
        self.folders_created += other.folders_created;
        self.failures.extend(other.failures);
        self.duration_ms += other.duration_ms;
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        if self.failed == 0 {
            SyncStatus::Completed
        } else {
            SyncStatus::CompletedWithFailures
        }
    }

    /// Human summary line, e.g. "2 transferred, 1 skipped, 0 failed"
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} transferred, {} skipped, {} failed",
            self.transferred, self.skipped, self.failed
        );
        if self.excluded > 0 {
            line.push_str(&format!(", {} excluded", self.excluded));
        }
        line
    }
}

/// Outcome of a cleanup pass over a remote folder tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Nothing was deleted; `deleted` lists what a real pass would delete
    pub dry_run: bool,
    /// Slash-separated paths relative to the cleaned folder
    pub deleted: Vec<String>,
    pub failures: Vec<TransferFailure>,
}

impl CleanupReport {
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub fn record_deleted(&mut self, path: impl Into<String>) {
        self.deleted.push(path.into());
    }

    pub fn record_failure(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(TransferFailure {
            path: path.into(),
            kind: FailureKind::Transfer,
            reason: reason.into(),
        });
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        if self.failures.is_empty() {
            SyncStatus::Completed
        } else {
            SyncStatus::CompletedWithFailures
        }
    }

    /// Human summary line, e.g. "2 deleted, 0 failed"
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "to delete" } else { "deleted" };
        format!(
            "{} {verb}, {} failed",
            self.deleted.len(),
            self.failures.len()
        )
    }
}
