//! Tree transfer commands
//!
//! `download`, `upload` and `upload-images` resolve both roots before any
//! transfer starts; a missing local directory or unknown folder id aborts
//! with a non-zero exit code. Failures of single files are printed as
//! warnings and do not change the exit code.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::info;

use igitur_core::domain::newtypes::RemoteId;
use igitur_core::domain::report::{SyncReport, TransferDirection};
use igitur_sync::{ImageCrateCompressor, ImagePreprocessor};

use super::{local_path, Context};
use crate::output::{print_report, report_json};

fn show(ctx: &Context, label: &str, report: &SyncReport) {
    let fmt = ctx.formatter();
    if ctx.is_json() {
        fmt.print_json(&report_json(report));
    } else {
        print_report(&*fmt, label, report);
    }
}

#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// Id of the drive folder to download
    pub folder_id: RemoteId,

    /// Existing local directory to download into
    pub dest: PathBuf,
}

impl DownloadCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let dest = local_path(&self.dest)?;
        let (_, client) = ctx.connect().await?;
        let engine = ctx.engine(client);

        let source_root = engine.resolve_remote_root(&self.folder_id).await?;
        let dest_root = engine.resolve_local_root(&dest).await?;
        info!(folder = %self.folder_id, dest = %dest, "Starting download");
        ctx.formatter()
            .info(&format!("Downloading {} into {}", source_root.name, dest));

        let report = engine
            .sync(&source_root, &dest_root, TransferDirection::Download)
            .await?;
        show(ctx, "Download", &report);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Id of the drive folder to upload into
    pub folder_id: RemoteId,

    /// Local directory to upload
    pub source: PathBuf,
}

impl UploadCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let source = local_path(&self.source)?;
        let (_, client) = ctx.connect().await?;
        let engine = ctx.engine(client);

        let source_root = engine.resolve_local_root(&source).await?;
        let dest_root = engine.resolve_remote_root(&self.folder_id).await?;
        info!(folder = %self.folder_id, source = %source, "Starting upload");
        ctx.formatter()
            .info(&format!("Uploading {} into {}", source, dest_root.name));

        let report = engine
            .sync(&source_root, &dest_root, TransferDirection::Upload)
            .await?;
        show(ctx, "Upload", &report);
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct UploadImagesCommand {
    /// Id of the drive folder to upload into
    pub folder_id: RemoteId,

    /// Local directory with images
    pub source: PathBuf,

    /// Skip files whose name contains PATTERN (case-insensitive, repeatable)
    #[arg(long = "skip-name", value_name = "PATTERN")]
    pub skip_names: Vec<String>,
}

impl UploadImagesCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let source = local_path(&self.source)?;
        let (_, client) = ctx.connect().await?;
        let engine = ctx.engine(client);

        let preprocessor =
            ImagePreprocessor::from_config(&ctx.config.images, Arc::new(ImageCrateCompressor::new()))
                .with_skip_names(self.skip_names.iter().cloned());

        let source_root = engine.resolve_local_root(&source).await?;
        let dest_root = engine.resolve_remote_root(&self.folder_id).await?;
        info!(
            folder = %self.folder_id,
            source = %source,
            max_width = preprocessor.settings().max_width,
            max_height = preprocessor.settings().max_height,
            "Starting image upload"
        );
        ctx.formatter()
            .info(&format!("Uploading images from {} into {}", source, dest_root.name));

        let report = engine
            .sync_images(&source_root, &dest_root, preprocessor)
            .await?;
        show(ctx, "Image upload", &report);
        Ok(())
    }
}
