//! Image compressor port
//!
//! Resampling and re-encoding are CPU-bound, so the trait is synchronous;
//! callers run it off the async executor.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Bounds and quality for a compressed copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Maximum width in pixels; larger images are scaled down
    pub max_width: u32,
    /// Maximum height in pixels; larger images are scaled down
    pub max_height: u32,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            max_width: 2000,
            max_height: 2000,
            jpeg_quality: 90,
        }
    }
}

pub trait IImageCompressor: Send + Sync {
    /// Write a compressed copy of `source` to `destination`
    ///
    /// The copy keeps the source's encoding, fits within the configured
    /// bounds preserving aspect ratio, and is never upscaled.
    fn compress(
        &self,
        source: &Path,
        destination: &Path,
        settings: &CompressionSettings,
    ) -> anyhow::Result<()>;
}
