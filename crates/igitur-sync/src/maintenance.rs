//! Remote drive cleanup
//!
//! Two passes over a remote folder tree. Both have a dry-run mode that
//! reports what would be deleted and deletes nothing.
//!
//! - [`RemoteCleaner::delete_duplicates`]: of several entries of one kind
//!   sharing a name in a folder, the first listed stays and the others are
//!   deleted. A deleted duplicate folder takes its content with it.
//! - [`RemoteCleaner::delete_empty_folders`]: deletes folders without any
//!   content, innermost first. The folder the pass starts from is kept.
//!
//! A failed listing or deletion is recorded and the pass continues; a
//! rejected session stops it.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use igitur_core::domain::entry::{Entry, EntryKind};
use igitur_core::domain::newtypes::RemoteId;
use igitur_core::domain::report::CleanupReport;
use igitur_core::ports::remote_drive::IRemoteDrive;

use crate::engine::{join_rel, rel_display, stop_on_auth, with_retry, EngineOptions};
use crate::SyncError;

type Pass<'a, T> = Pin<Box<dyn Future<Output = Result<T, SyncError>> + Send + 'a>>;

/// Deletes duplicate entries and empty folders on the remote drive
pub struct RemoteCleaner {
    remote: Arc<dyn IRemoteDrive>,
    options: EngineOptions,
}

impl RemoteCleaner {
    pub fn new(remote: Arc<dyn IRemoteDrive>, options: EngineOptions) -> Self {
        Self { remote, options }
    }

    /// Deletes all but the first of same-named entries, folder by folder
    ///
    /// # Errors
    /// `SyncError::Auth` if the session is rejected
    #[instrument(skip(self), fields(root = %root))]
    pub async fn delete_duplicates(&self, root: &RemoteId, dry_run: bool) -> Result<CleanupReport, SyncError> {
        let mut report = CleanupReport::new(dry_run);
        self.dedupe(root.clone(), String::new(), &mut report).await?;
        info!(
            deleted = report.deleted.len(),
            failed = report.failures.len(),
            dry_run,
            "Duplicate cleanup complete"
        );
        Ok(report)
    }

    /// Deletes every folder below `root` that holds nothing
    ///
    /// A folder whose only children are empty folders counts as empty.
    /// Children that are not part of the file tree keep a folder alive.
    ///
    /// # Errors
    /// `SyncError::Auth` if the session is rejected
    #[instrument(skip(self), fields(root = %root))]
    pub async fn delete_empty_folders(&self, root: &RemoteId, dry_run: bool) -> Result<CleanupReport, SyncError> {
        let mut report = CleanupReport::new(dry_run);
        self.prune(root.clone(), String::new(), &mut report).await?;
        info!(
            deleted = report.deleted.len(),
            failed = report.failures.len(),
            dry_run,
            "Empty folder cleanup complete"
        );
        Ok(report)
    }

    async fn list(&self, folder: &RemoteId, rel: &str, report: &mut CleanupReport) -> Result<Option<Vec<Entry>>, SyncError> {
        match with_retry("list folder", &self.options, || self.remote.list_folder(folder)).await {
            Ok(children) => Ok(Some(children)),
            Err(e) => {
                stop_on_auth(&e)?;
                warn!(path = rel_display(rel), error = %e, "Listing folder failed");
                report.record_failure(rel_display(rel), format!("listing folder failed: {e:#}"));
                Ok(None)
            }
        }
    }

    /// Deletes `entry`, or only records it on a dry run
    ///
    /// Returns whether the entry is gone (or would be).
    async fn delete(&self, entry: &Entry, rel: &str, report: &mut CleanupReport) -> Result<bool, SyncError> {
        let Some(id) = entry.identity.as_remote() else {
            report.record_failure(rel, format!("{} is not a remote entry", entry.identity));
            return Ok(false);
        };
        if report.dry_run {
            info!(path = rel, "Would delete");
            report.record_deleted(rel);
            return Ok(true);
        }

        let result = with_retry("delete", &self.options, || async move {
            match entry.kind {
                EntryKind::Folder => self.remote.delete_folder(id).await,
                EntryKind::File => self.remote.delete_file(id).await,
            }
        })
        .await;
        match result {
            Ok(()) => {
                info!(path = rel, "Deleted");
                report.record_deleted(rel);
                Ok(true)
            }
            Err(e) => {
                stop_on_auth(&e)?;
                warn!(path = rel, error = %e, "Delete failed");
                report.record_failure(rel, format!("{e:#}"));
                Ok(false)
            }
        }
    }

    fn dedupe<'a>(&'a self, folder: RemoteId, rel: String, report: &'a mut CleanupReport) -> Pass<'a, ()> {
        Box::pin(async move {
            let Some(children) = self.list(&folder, &rel, report).await? else {
                return Ok(());
            };

            let mut seen: HashSet<(EntryKind, String)> = HashSet::new();
            let mut kept_folders = Vec::new();
            for child in children {
                let child_rel = join_rel(&rel, &child.name);
                if seen.insert((child.kind, child.name.clone())) {
                    if let Some(id) = child.identity.as_remote().filter(|_| child.is_folder()) {
                        kept_folders.push((id.clone(), child_rel));
                    }
                    continue;
                }
                debug!(path = %child_rel, "Duplicate name");
                self.delete(&child, &child_rel, report).await?;
            }

            for (id, child_rel) in kept_folders {
                self.dedupe(id, child_rel, report).await?;
            }
            Ok(())
        })
    }

    /// Returns whether `folder` is empty once its empty subfolders are gone
    fn prune<'a>(&'a self, folder: RemoteId, rel: String, report: &'a mut CleanupReport) -> Pass<'a, bool> {
        Box::pin(async move {
            let Some(children) = self.list(&folder, &rel, report).await? else {
                return Ok(false);
            };

            let listed = children.len();
            let mut removed = 0;
            for child in &children {
                let Some(id) = child.identity.as_remote().filter(|_| child.is_folder()) else {
                    continue;
                };
                let child_rel = join_rel(&rel, &child.name);
                if self.prune(id.clone(), child_rel.clone(), report).await?
                    && self.delete(child, &child_rel, report).await?
                {
                    removed += 1;
                }
            }
            if removed < listed {
                return Ok(false);
            }

            // Polls, links and unusable names are not listed but still count.
            let still_present = if report.dry_run { listed } else { 0 };
            let total = match with_retry("count children", &self.options, || {
                self.remote.count_children(&folder)
            })
            .await
            {
                Ok(total) => total,
                Err(e) => {
                    stop_on_auth(&e)?;
                    warn!(path = rel_display(&rel), error = %e, "Counting children failed");
                    report.record_failure(rel_display(&rel), format!("counting children failed: {e:#}"));
                    return Ok(false);
                }
            };
            if total > still_present {
                debug!(path = rel_display(&rel), hidden = total - still_present, "Folder holds entries outside the tree");
                return Ok(false);
            }
            Ok(true)
        })
    }
}
