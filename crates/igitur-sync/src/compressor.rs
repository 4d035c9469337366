//! `image`-crate backed [`IImageCompressor`]

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use igitur_core::ports::image_compressor::{CompressionSettings, IImageCompressor};

/// Downscales with Lanczos3 and re-encodes in the source's format
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateCompressor;

impl ImageCrateCompressor {
    pub fn new() -> Self {
        Self
    }
}

/// Shrinks `img` to fit the bounds; smaller images are returned as is
fn fit_within(img: DynamicImage, settings: &CompressionSettings) -> DynamicImage {
    if img.width() <= settings.max_width && img.height() <= settings.max_height {
        return img;
    }
    img.resize(settings.max_width, settings.max_height, FilterType::Lanczos3)
}

impl IImageCompressor for ImageCrateCompressor {
    fn compress(&self, source: &Path, destination: &Path, settings: &CompressionSettings) -> Result<()> {
        let format = ImageFormat::from_path(source)
            .with_context(|| format!("Unknown image format: {}", source.display()))?;
        let img = image::open(source)
            .with_context(|| format!("Failed to decode {}", source.display()))?;
        let (width, height) = (img.width(), img.height());
        let img = fit_within(img, settings);

        match format {
            ImageFormat::Jpeg => {
                let file = File::create(destination)
                    .with_context(|| format!("Failed to create {}", destination.display()))?;
                let mut writer = BufWriter::new(file);
                let encoder = JpegEncoder::new_with_quality(&mut writer, settings.jpeg_quality);
                // JPEG has no alpha channel
                DynamicImage::ImageRgb8(img.to_rgb8())
                    .write_with_encoder(encoder)
                    .context("Failed to encode JPEG")?;
            }
            other => img
                .save_with_format(destination, other)
                .with_context(|| format!("Failed to encode {other:?}"))?,
        }

        tracing::debug!(
            source = %source.display(),
            from = %format!("{width}x{height}"),
            to = %format!("{}x{}", img.width(), img.height()),
            "Compressed image"
        );
        Ok(())
    }
}
