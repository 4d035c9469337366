//! Remote drive cleanup commands
//!
//! `delete-duplicates` and `delete-empty-folders` only touch the drive.
//! With `--dry-run` they list what they would delete and change nothing.

use anyhow::Result;
use clap::Args;
use tracing::info;

use igitur_core::domain::newtypes::RemoteId;
use igitur_core::domain::report::CleanupReport;

use super::Context;
use crate::output::OutputFormatter;

/// JSON form of a cleanup report
pub fn cleanup_json(report: &CleanupReport) -> serde_json::Value {
    serde_json::json!({
        "status": report.status().to_string(),
        "dry_run": report.dry_run,
        "deleted": report.deleted,
        "failures": report.failures,
        "summary": report.summary(),
    })
}

fn print_cleanup(fmt: &dyn OutputFormatter, report: &CleanupReport) {
    let prefix = if report.dry_run { "Would delete" } else { "Deleted" };
    for path in &report.deleted {
        fmt.info(&format!("{prefix} {path}"));
    }
    for failure in &report.failures {
        fmt.warn(&failure.to_string());
    }
    fmt.success(&report.summary());
}

fn show(ctx: &Context, report: &CleanupReport) {
    let fmt = ctx.formatter();
    if ctx.is_json() {
        fmt.print_json(&cleanup_json(report));
    } else {
        print_cleanup(&*fmt, report);
    }
}

#[derive(Debug, Args)]
pub struct DeleteDuplicatesCommand {
    /// Id of the drive folder to clean
    pub folder_id: RemoteId,

    /// List what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

impl DeleteDuplicatesCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let (_, client) = ctx.connect().await?;
        let engine = ctx.engine(client);

        let root = engine.resolve_remote_root(&self.folder_id).await?;
        info!(folder = %self.folder_id, dry_run = self.dry_run, "Deleting duplicate entries");
        ctx.formatter()
            .info(&format!("Looking for duplicates in {}", root.name));

        let report = engine
            .cleaner()
            .delete_duplicates(&self.folder_id, self.dry_run)
            .await?;
        show(ctx, &report);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct DeleteEmptyFoldersCommand {
    /// Id of the drive folder to clean; the folder itself is kept
    pub folder_id: RemoteId,

    /// List what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

impl DeleteEmptyFoldersCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let (_, client) = ctx.connect().await?;
        let engine = ctx.engine(client);

        let root = engine.resolve_remote_root(&self.folder_id).await?;
        info!(folder = %self.folder_id, dry_run = self.dry_run, "Deleting empty folders");
        ctx.formatter()
            .info(&format!("Looking for empty folders in {}", root.name));

        let report = engine
            .cleaner()
            .delete_empty_folders(&self.folder_id, self.dry_run)
            .await?;
        show(ctx, &report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_json_marks_dry_run() {
        let mut report = CleanupReport::new(true);
        report.record_deleted("a/copy.jpg");
        report.record_failure("b", "Server error: 500");

        let json = cleanup_json(&report);
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["deleted"][0], "a/copy.jpg");
        assert_eq!(json["failures"][0]["path"], "b");
        assert_eq!(json["summary"], "1 to delete, 1 failed");
    }
}
