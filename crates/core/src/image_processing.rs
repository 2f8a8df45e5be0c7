//! Image codec adapter.
//!
//! This module decodes source images, encodes the engine input copy and the
//! exported mask, and converts between the engine's PNG payloads and in-memory
//! rasters.
//!
//! # Pixel Layout
//!
//! Every source image is converted to interleaved 8-bit RGB on load, whatever
//! the file stored (grayscale, alpha, 16-bit). Masks are exported as 8-bit
//! grayscale PNG with values 0 and 255.

use crate::error::{AppError, Result};
use crate::geometry::ImageSize;
use crate::mask::Mask;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// File extensions offered by open dialogs.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// An immutable decoded source image.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    path: Option<PathBuf>,
    pixels: RgbImage,
}

impl SourceImage {
    pub fn new(pixels: RgbImage) -> Self {
        Self { path: None, pixels }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.pixels.width(), self.pixels.height())
    }
}

/// Codec helpers for the segmentation workflow.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Decodes the image at `path` into RGB.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ImageLoad`] if the file is unreadable, not a
    /// supported format, or has zero area.
    pub fn load(path: &Path) -> Result<SourceImage> {
        let load_err = |reason: String| AppError::ImageLoad {
            path: path.to_path_buf(),
            reason,
        };

        let decoded = image::open(path).map_err(|e| load_err(e.to_string()))?;
        let pixels = decoded.to_rgb8();
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(load_err("image has no pixels".to_string()));
        }

        tracing::info!(
            path = %path.display(),
            width = pixels.width(),
            height = pixels.height(),
            "loaded image"
        );

        Ok(SourceImage {
            path: Some(path.to_path_buf()),
            pixels,
        })
    }

    /// Writes `mask` as an 8-bit grayscale PNG, whatever the extension of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ImageSave`] if encoding or writing fails.
    pub fn save_mask(path: &Path, mask: &Mask) -> Result<()> {
        let bytes = Self::encode_png(&DynamicImage::ImageLuma8(mask.to_gray_image()))?;
        fs::write(path, bytes).map_err(|e| AppError::ImageSave {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        tracing::info!(path = %path.display(), coverage = mask.coverage(), "saved mask");
        Ok(())
    }

    /// Encodes `image` as PNG at `path`, creating parent directories on demand.
    ///
    /// This is the copy the engine reads; it is overwritten for every job.
    pub fn write_engine_input(image: &SourceImage, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = Self::encode_png(&DynamicImage::ImageRgb8(image.pixels.clone()))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Encodes any image to PNG bytes.
    pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer: Vec<u8> = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| AppError::image(format!("Failed to encode PNG: {}", e)))?;
        Ok(buffer)
    }

    /// Decodes PNG bytes into a single-channel raster; color payloads are
    /// reduced to luma.
    pub fn decode_gray_png(bytes: &[u8]) -> Result<GrayImage> {
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .map_err(|e| AppError::image(format!("Failed to decode PNG: {}", e)))?;
        Ok(decoded.to_luma8())
    }
}
