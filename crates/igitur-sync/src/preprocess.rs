//! Image preprocessing for `upload-images`
//!
//! Every accepted image is compressed into a private temporary directory
//! and the compressed bytes are uploaded under the original name. Files
//! that are not accepted are excluded from the walk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tempfile::TempDir;
use tracing::debug;

use igitur_core::config::ImagesConfig;
use igitur_core::domain::entry::{Entry, EntryIdentity};
use igitur_core::ports::image_compressor::{CompressionSettings, IImageCompressor};

use crate::tree::{LocalTree, SourceTree};

/// Extensions processed when none are configured
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];

/// Compressed copy of one image
///
/// The temporary directory, and with it the copy, is removed on drop.
#[derive(Debug)]
pub struct PreparedImage {
    _dir: TempDir,
    path: PathBuf,
}

impl PreparedImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read compressed copy {}", self.path.display()))
    }
}

/// Filters and compresses images ahead of upload
#[derive(Clone)]
pub struct ImagePreprocessor {
    compressor: Arc<dyn IImageCompressor>,
    settings: CompressionSettings,
    allowed_extensions: Vec<String>,
    skip_names: Vec<String>,
}

impl ImagePreprocessor {
    pub fn new(compressor: Arc<dyn IImageCompressor>, settings: CompressionSettings) -> Self {
        Self {
            compressor,
            settings,
            allowed_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            skip_names: Vec::new(),
        }
    }

    pub fn from_config(config: &ImagesConfig, compressor: Arc<dyn IImageCompressor>) -> Self {
        Self::new(compressor, config.compression_settings())
            .with_allowed_extensions(config.allowed_extensions.clone())
            .with_skip_names(config.skip_names.clone())
    }

    pub fn with_allowed_extensions(mut self, extensions: Vec<String>) -> Self {
        self.allowed_extensions = extensions.iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// Adds name fragments that exclude a file
    pub fn with_skip_names(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.skip_names
            .extend(patterns.into_iter().map(|p| p.to_lowercase()));
        self
    }

    pub fn settings(&self) -> &CompressionSettings {
        &self.settings
    }

    /// Whether `name` has an allowed extension and matches no skip pattern
    ///
    /// Both checks ignore case.
    pub fn accepts(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.allowed_extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
            && !self
                .skip_names
                .iter()
                .any(|pattern| lower.contains(pattern.as_str()))
    }

    /// Compresses `source` into a fresh temporary directory
    ///
    /// The copy keeps the source's file name, and with it its format.
    ///
    /// # Errors
    /// Returns error if the compressor fails; the caller must not fall back
    /// to the original file.
    pub async fn prepare(&self, source: &Path) -> Result<PreparedImage> {
        let file_name = source
            .file_name()
            .ok_or_else(|| anyhow!("{} has no file name", source.display()))?;
        let dir = tempfile::Builder::new()
            .prefix("igitur-img-")
            .tempdir()
            .context("Failed to create temporary directory")?;
        let path = dir.path().join(file_name);

        let compressor = Arc::clone(&self.compressor);
        let settings = self.settings;
        let (src, dst) = (source.to_path_buf(), path.clone());
        tokio::task::spawn_blocking(move || compressor.compress(&src, &dst, &settings))
            .await
            .context("Compression task panicked")?
            .with_context(|| format!("Failed to compress {}", source.display()))?;

        debug!(source = %source.display(), "Prepared compressed copy");
        Ok(PreparedImage { _dir: dir, path })
    }
}

// ============================================================================
// CompressedImageSource
// ============================================================================

/// Local tree whose files are read through the preprocessor
pub struct CompressedImageSource {
    local: LocalTree,
    preprocessor: ImagePreprocessor,
}

impl CompressedImageSource {
    pub fn new(local: LocalTree, preprocessor: ImagePreprocessor) -> Self {
        Self {
            local,
            preprocessor,
        }
    }
}

#[async_trait::async_trait]
impl SourceTree for CompressedImageSource {
    async fn list(&self, folder: &EntryIdentity) -> Result<Vec<Entry>> {
        SourceTree::list(&self.local, folder).await
    }

    async fn read(&self, file: &Entry) -> Result<Vec<u8>> {
        let path = file
            .identity
            .as_local()
            .ok_or_else(|| anyhow!("{} is not a local entry", file.identity))?;
        let prepared = self.preprocessor.prepare(path.as_path()).await?;
        prepared.read().await
    }

    fn admits(&self, file: &Entry) -> bool {
        self.preprocessor.accepts(&file.name)
    }
}
