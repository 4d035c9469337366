//! Tree reconciliation engine
//!
//! The [`ReconciliationEngine`] mirrors a source folder tree into a
//! destination folder tree, one direction at a time.
//!
//! ## Walk
//!
//! Depth-first, pre-order. For every source folder the engine takes one
//! source listing and one destination snapshot, then per child:
//!
//! 1. **Folder**: reuse the destination folder of the same name or create
//!    it, then recurse
//! 2. **File present by name**: skip (no size or checksum comparison)
//! 3. **File absent**: transfer
//!
//! Nothing is remembered between runs. A re-run derives the remaining work
//! from the live trees again, which is what makes interrupted runs resume
//! and complete runs idempotent.
//!
//! ## Retry Logic
//!
//! Transient errors (network, rate limiting, server errors) of a listing,
//! folder creation or file transfer are retried with exponential backoff
//! before the entry is recorded as failed. A failed entry never aborts the
//! walk.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::{debug, info, instrument, warn};

use igitur_core::config::TransferConfig;
use igitur_core::domain::entry::{Entry, EntryIdentity, EntryKind};
use igitur_core::domain::newtypes::{LocalPath, RemoteId};
use igitur_core::domain::report::{
    CollisionPolicy, FailureKind, SkipDecision, SyncReport, TransferDirection, TransferTask,
};
use igitur_core::ports::local_tree::ILocalTree;
use igitur_core::ports::remote_drive::IRemoteDrive;

use crate::maintenance::RemoteCleaner;
use crate::preprocess::{CompressedImageSource, ImagePreprocessor};
use crate::tree::{DestinationTree, LocalTree, RemoteTree, SourceTree};
use crate::SyncError;

// ============================================================================
// Retry logic
// ============================================================================

/// Walk tuning taken from the `transfer` configuration section
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Retries of a transient failure before the entry is recorded
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry
    pub retry_base_delay: Duration,
    pub collision_policy: CollisionPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            collision_policy: CollisionPolicy::Fail,
        }
    }
}

impl From<&TransferConfig> for EngineOptions {
    fn from(config: &TransferConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
            collision_policy: config.collision_policy,
        }
    }
}

/// Leading words of adapter errors that are worth retrying
const TRANSIENT_KINDS: &[&str] = &["network error", "server error", "too many requests"];

/// Socket-level failures as they read at the bottom of an error chain
const TRANSIENT_CAUSES: &[&str] = &[
    "timed out",
    "connection reset",
    "connection refused",
    "connection closed",
    "reset by peer",
    "broken pipe",
    "dns error",
];

/// Determines whether an error is transient (retryable)
///
/// Transient errors include:
/// - Network errors (connection refused, timeout, DNS)
/// - Rate limiting (HTTP 429)
/// - Server errors (HTTP 5xx)
///
/// Only the kind of each error in the chain and the root cause are
/// inspected. Context messages carry file names and paths and never make
/// an error transient.
pub(crate) fn is_transient_error(err: &anyhow::Error) -> bool {
    let by_kind = err.chain().any(|cause| {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            );
        }
        let message = cause.to_string().to_lowercase();
        TRANSIENT_KINDS.iter().any(|kind| message.starts_with(kind))
    });
    if by_kind {
        return true;
    }

    let root = err.root_cause().to_string().to_lowercase();
    TRANSIENT_CAUSES.iter().any(|cause| root.contains(cause))
}

/// Determines whether an error means the session is gone
///
/// Such an error stops a walk: every further request would fail the same
/// way.
pub(crate) fn is_auth_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(cause.downcast_ref::<SyncError>(), Some(SyncError::Auth(_)))
            || cause.to_string().to_lowercase().starts_with("unauthorized")
    })
}

/// `Err(SyncError::Auth)` for a session failure, `Ok` for anything else
pub(crate) fn stop_on_auth(err: &anyhow::Error) -> Result<(), SyncError> {
    if is_auth_error(err) {
        warn!(error = %err, "Session rejected, stopping");
        return Err(SyncError::Auth(format!("{err:#}")));
    }
    Ok(())
}

/// Executes an async operation with exponential backoff retry
///
/// Only retries on transient errors. Non-transient errors are returned
/// immediately.
pub(crate) async fn with_retry<F, Fut, T>(operation_name: &str, options: &EngineOptions, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if attempt < options.max_retries && is_transient_error(&err) => {
                let delay = options.retry_base_delay * 2u32.saturating_pow(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Name for the `n`-th entry sharing `name`, e.g. `photo (2).jpg`
pub fn suffixed_name(name: &str, kind: EntryKind, n: u32) -> String {
    if kind == EntryKind::File {
        if let Some(dot) = name.rfind('.').filter(|&i| i > 0) {
            return format!("{} ({n}){}", &name[..dot], &name[dot..]);
        }
    }
    format!("{name} ({n})")
}

/// Destination names for the children of one source folder
///
/// Names unique in the listing map to themselves. Shared names follow
/// `policy`: with [`CollisionPolicy::Fail`] every entry of the name maps to
/// `None`; with [`CollisionPolicy::Suffix`] the first keeps the name and
/// later ones get the lowest free `name (n)` suffix.
pub fn resolve_names(children: Vec<Entry>, policy: CollisionPolicy) -> Vec<(Entry, Option<String>)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for child in &children {
        *counts.entry(child.name.clone()).or_default() += 1;
    }

    match policy {
        CollisionPolicy::Fail => children
            .into_iter()
            .map(|child| {
                let target = (counts[&child.name] == 1).then(|| child.name.clone());
                (child, target)
            })
            .collect(),
        CollisionPolicy::Suffix => {
            let mut taken: HashSet<String> = counts.into_keys().collect();
            let mut seen: HashSet<String> = HashSet::new();
            children
                .into_iter()
                .map(|child| {
                    if seen.insert(child.name.clone()) {
                        let target = child.name.clone();
                        return (child, Some(target));
                    }
                    let mut n = 2;
                    let target = loop {
                        let candidate = suffixed_name(&child.name, child.kind, n);
                        if taken.insert(candidate.clone()) {
                            break candidate;
                        }
                        n += 1;
                    };
                    (child, Some(target))
                })
                .collect()
        }
    }
}

/// Classifies one source child against the destination snapshot
///
/// `existing` is the destination entry carrying the child's target name.
pub fn classify(entry: &Entry, admitted: bool, existing: Option<&Entry>) -> SkipDecision {
    if entry.is_folder() {
        SkipDecision::DescendFolder
    } else if !admitted {
        SkipDecision::Excluded
    } else if existing.is_some() {
        SkipDecision::SkipExists
    } else {
        SkipDecision::TransferNew
    }
}

pub(crate) fn join_rel(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

pub(crate) fn rel_display(rel: &str) -> &str {
    if rel.is_empty() {
        "."
    } else {
        rel
    }
}

fn direction_into(destination: &EntryIdentity) -> TransferDirection {
    if destination.is_local() {
        TransferDirection::Download
    } else {
        TransferDirection::Upload
    }
}

// ============================================================================
// ReconciliationEngine
// ============================================================================

/// One-way tree mirror between the remote drive and the local disk
///
/// The engine keeps no state between calls; every `sync` starts from the
/// live listings of both sides.
pub struct ReconciliationEngine {
    remote: Arc<dyn IRemoteDrive>,
    local: Arc<dyn ILocalTree>,
    options: EngineOptions,
}

impl ReconciliationEngine {
    pub fn new(remote: Arc<dyn IRemoteDrive>, local: Arc<dyn ILocalTree>) -> Self {
        Self {
            remote,
            local,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn remote_tree(&self) -> RemoteTree {
        RemoteTree::new(Arc::clone(&self.remote))
    }

    pub fn local_tree(&self) -> LocalTree {
        LocalTree::new(Arc::clone(&self.local))
    }

    /// Cleanup passes over the remote drive with this engine's retry settings
    pub fn cleaner(&self) -> RemoteCleaner {
        RemoteCleaner::new(Arc::clone(&self.remote), self.options.clone())
    }

    /// Resolves a remote folder id to a root entry
    ///
    /// # Errors
    /// `SyncError::InvalidRoot` if the id is unknown or not a folder
    pub async fn resolve_remote_root(&self, id: &RemoteId) -> Result<Entry, SyncError> {
        self.remote
            .get_folder(id)
            .await
            .map_err(|e| {
                if is_auth_error(&e) {
                    SyncError::Auth(format!("{e:#}"))
                } else {
                    SyncError::invalid_root(format!("remote:{id}"), format!("{e:#}"))
                }
            })
    }

    /// Resolves an existing local directory to a root entry
    ///
    /// # Errors
    /// `SyncError::InvalidRoot` if the path is missing or not a directory
    pub async fn resolve_local_root(&self, path: &LocalPath) -> Result<Entry, SyncError> {
        self.check_local_root(path).await?;
        let name = path.file_name().unwrap_or("/").to_string();
        Ok(Entry::root(name, EntryIdentity::Local(path.clone())))
    }

    async fn check_local_root(&self, path: &LocalPath) -> Result<(), SyncError> {
        let state = self
            .local
            .get_state(path)
            .await
            .map_err(|e| SyncError::invalid_root(path, format!("{e:#}")))?;
        if !state.exists {
            return Err(SyncError::invalid_root(path, "does not exist"));
        }
        if !state.is_directory() {
            return Err(SyncError::invalid_root(path, "is not a directory"));
        }
        Ok(())
    }

    async fn check_roots(
        &self,
        source_root: &Entry,
        dest_root: &Entry,
        direction: TransferDirection,
    ) -> Result<(), SyncError> {
        for (root, role, on_side) in [
            (source_root, "source", direction.is_source_side(&source_root.identity)),
            (dest_root, "destination", direction.is_destination_side(&dest_root.identity)),
        ] {
            if !root.is_folder() {
                return Err(SyncError::invalid_root(&root.identity, "is not a folder"));
            }
            if !on_side {
                return Err(SyncError::invalid_root(
                    &root.identity,
                    format!("cannot be the {role} of a {direction}"),
                ));
            }
            if let EntryIdentity::Local(path) = &root.identity {
                self.check_local_root(path).await?;
            }
        }
        Ok(())
    }

    /// Mirrors `source_root` into `dest_root`
    ///
    /// # Errors
    /// `SyncError::InvalidRoot` if a root is not a folder, is missing, or
    /// lives on the wrong side for `direction`. Per-entry failures are
    /// recorded in the report instead.
    #[instrument(skip(self, source_root, dest_root), fields(source = %source_root.identity, dest = %dest_root.identity))]
    pub async fn sync(
        &self,
        source_root: &Entry,
        dest_root: &Entry,
        direction: TransferDirection,
    ) -> Result<SyncReport, SyncError> {
        self.check_roots(source_root, dest_root, direction).await?;

        let remote = self.remote_tree();
        let local = self.local_tree();
        match direction {
            TransferDirection::Download => {
                self.sync_tree(&remote, &local, source_root, dest_root).await
            }
            TransferDirection::Upload => {
                self.sync_tree(&local, &remote, source_root, dest_root).await
            }
        }
    }

    /// Uploads a local tree, compressing each image on the way
    ///
    /// Files the preprocessor does not accept are counted as excluded.
    /// A file whose compression fails is recorded as failed and is not
    /// uploaded in its original form.
    #[instrument(skip(self, source_root, dest_root, preprocessor), fields(source = %source_root.identity, dest = %dest_root.identity))]
    pub async fn sync_images(
        &self,
        source_root: &Entry,
        dest_root: &Entry,
        preprocessor: ImagePreprocessor,
    ) -> Result<SyncReport, SyncError> {
        self.check_roots(source_root, dest_root, TransferDirection::Upload)
            .await?;

        let source = CompressedImageSource::new(self.local_tree(), preprocessor);
        self.sync_tree(&source, &self.remote_tree(), source_root, dest_root)
            .await
    }

    /// Mirrors any source tree into any destination tree
    ///
    /// Roots must be folders; side checks are the caller's business.
    ///
    /// # Errors
    /// `SyncError::Auth` as soon as the service rejects the session; the
    /// entries transferred up to then stay in place.
    pub async fn sync_tree(
        &self,
        source: &dyn SourceTree,
        destination: &dyn DestinationTree,
        source_root: &Entry,
        dest_root: &Entry,
    ) -> Result<SyncReport, SyncError> {
        for root in [source_root, dest_root] {
            if root.kind != EntryKind::Folder {
                return Err(SyncError::invalid_root(&root.identity, "is not a folder"));
            }
        }

        let started = Instant::now();
        let mut report = SyncReport::new();
        self.walk(
            source,
            destination,
            source_root.identity.clone(),
            dest_root.identity.clone(),
            String::new(),
            &mut report,
        )
        .await?;
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            transferred = report.transferred,
            skipped = report.skipped,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Walk complete"
        );
        Ok(report)
    }

    /// Returns destination folder `name` under `parent`, creating it if absent
    ///
    /// Calling this twice with the same arguments yields one folder.
    pub async fn ensure_or_create(
        &self,
        destination: &dyn DestinationTree,
        parent: &EntryIdentity,
        name: &str,
    ) -> Result<EntryIdentity> {
        let snapshot = with_retry("list destination", &self.options, || destination.list(parent)).await?;
        let existing = snapshot.iter().find(|e| e.name == name);
        Ok(self
            .ensure_in_snapshot(destination, parent, name, existing)
            .await?
            .0)
    }

    /// Folder `name` given the snapshot entry of that name, if any
    ///
    /// Returns the identity and whether it was created.
    async fn ensure_in_snapshot(
        &self,
        destination: &dyn DestinationTree,
        parent: &EntryIdentity,
        name: &str,
        existing: Option<&Entry>,
    ) -> Result<(EntryIdentity, bool)> {
        match existing {
            Some(entry) if entry.is_folder() => Ok((entry.identity.clone(), false)),
            Some(_) => bail!("a file named {name:?} is in the way"),
            None => {
                let id = with_retry("create folder", &self.options, || {
                    destination.ensure_folder(parent, name)
                })
                .await?;
                debug!(name, "Created destination folder");
                Ok((id, true))
            }
        }
    }

    async fn transfer(
        &self,
        source: &dyn SourceTree,
        destination: &dyn DestinationTree,
        task: &TransferTask,
    ) -> Result<()> {
        with_retry("transfer", &self.options, || async move {
            let data = source.read(&task.source).await?;
            destination
                .write(&task.destination_parent, &task.target_name, data)
                .await
        })
        .await
    }

    fn walk<'a>(
        &'a self,
        source: &'a dyn SourceTree,
        destination: &'a dyn DestinationTree,
        source_folder: EntryIdentity,
        dest_folder: EntryIdentity,
        rel: String,
        report: &'a mut SyncReport,
    ) -> Pin<Box<dyn Future<Output = Result<(), SyncError>> + Send + 'a>> {
        Box::pin(async move {
            let (src, dst) = (&source_folder, &dest_folder);

            let children = match with_retry("list source", &self.options, || source.list(src)).await {
                Ok(children) => children,
                Err(e) => {
                    stop_on_auth(&e)?;
                    warn!(path = rel_display(&rel), error = %e, "Listing source folder failed");
                    report.record_failure(
                        rel_display(&rel),
                        FailureKind::Transfer,
                        format!("listing source folder failed: {e:#}"),
                    );
                    return Ok(());
                }
            };

            let snapshot: HashMap<String, Entry> =
                match with_retry("list destination", &self.options, || destination.list(dst)).await {
                    Ok(entries) => entries.into_iter().map(|e| (e.name.clone(), e)).collect(),
                    Err(e) => {
                        stop_on_auth(&e)?;
                        warn!(path = rel_display(&rel), error = %e, "Listing destination folder failed");
                        report.record_failure(
                            rel_display(&rel),
                            FailureKind::Transfer,
                            format!("listing destination folder failed: {e:#}"),
                        );
                        return Ok(());
                    }
                };

            debug!(
                path = rel_display(&rel),
                children = children.len(),
                present = snapshot.len(),
                "Reconciling folder"
            );

            for (child, target) in resolve_names(children, self.options.collision_policy) {
                let child_rel = join_rel(&rel, &child.name);

                let decision = match &target {
                    None => SkipDecision::Ambiguous,
                    Some(name) => {
                        let admitted = child.is_folder() || source.admits(&child);
                        classify(&child, admitted, snapshot.get(name))
                    }
                };

                match (decision, target) {
                    (SkipDecision::DescendFolder, Some(name)) => {
                        let dest_child = match self
                            .ensure_in_snapshot(destination, &dest_folder, &name, snapshot.get(&name))
                            .await
                        {
                            Ok((id, created)) => {
                                if created {
                                    report.record_folder_created();
                                }
                                id
                            }
                            Err(e) => {
                                stop_on_auth(&e)?;
                                warn!(path = %child_rel, error = %e, "Cannot create destination folder");
                                report.record_failure(&child_rel, FailureKind::Transfer, format!("{e:#}"));
                                continue;
                            }
                        };
                        self.walk(
                            source,
                            destination,
                            child.identity.clone(),
                            dest_child,
                            child_rel,
                            report,
                        )
                        .await?;
                    }
                    (SkipDecision::SkipExists, _) => {
                        debug!(path = %child_rel, "Already present, skipping");
                        report.record_skipped();
                    }
                    (SkipDecision::Excluded, _) => {
                        debug!(path = %child_rel, "Excluded");
                        report.record_excluded();
                    }
                    (SkipDecision::TransferNew, Some(name)) => {
                        let task = TransferTask {
                            direction: direction_into(&dest_folder),
                            destination_parent: dest_folder.clone(),
                            target_name: name,
                            source: child,
                        };
                        match self.transfer(source, destination, &task).await {
                            Ok(()) => {
                                info!(path = %child_rel, direction = %task.direction, "Transferred");
                                report.record_transferred();
                            }
                            Err(e) => {
                                stop_on_auth(&e)?;
                                warn!(path = %child_rel, error = %e, "Transfer failed");
                                report.record_failure(&child_rel, FailureKind::Transfer, format!("{e:#}"));
                            }
                        }
                    }
                    _ => {
                        warn!(path = %child_rel, "Name shared by several source entries");
                        report.record_failure(
                            &child_rel,
                            FailureKind::NameCollision,
                            "several source entries share this name",
                        );
                    }
                }
            }
            Ok(())
        })
    }
}
