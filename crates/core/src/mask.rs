//! Binary segmentation masks.

use crate::error::{AppError, Result};
use crate::geometry::ImageSize;
use image::{GrayImage, Luma, RgbaImage};

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// Per-pixel foreground flags stored as 0/255 bytes, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    size: ImageSize,
    data: Vec<u8>,
}

impl Mask {
    /// Wraps raw 0/255 bytes; any non-zero byte is normalized to 255.
    pub fn from_raw(size: ImageSize, mut data: Vec<u8>) -> Result<Self> {
        let expected = size.width as usize * size.height as usize;
        if data.len() != expected {
            return Err(AppError::image(format!(
                "mask buffer holds {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                size.width,
                size.height
            )));
        }
        for value in &mut data {
            if *value != MASK_OFF {
                *value = MASK_ON;
            }
        }
        Ok(Self { size, data })
    }

    /// Turns an engine probability raster into a mask at `target` resolution.
    ///
    /// The raster is sampled nearest-neighbour when its size differs, and every
    /// pixel at or above `threshold` (in 0..1) becomes foreground.
    pub fn from_probabilities(probabilities: &GrayImage, target: ImageSize, threshold: f32) -> Self {
        let (src_w, src_h) = probabilities.dimensions();
        let cutoff = ((threshold.clamp(0.0, 1.0) * 255.0).round() as u8).max(1);

        let mut data = Vec::with_capacity(target.width as usize * target.height as usize);
        for y in 0..target.height {
            let sy = nearest(y, target.height, src_h);
            for x in 0..target.width {
                let sx = nearest(x, target.width, src_w);
                let on = src_w > 0 && src_h > 0 && probabilities.get_pixel(sx, sy).0[0] >= cutoff;
                data.push(if on { MASK_ON } else { MASK_OFF });
            }
        }

        Self { size: target, data }
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        x < self.size.width
            && y < self.size.height
            && self.data[(y as usize) * self.size.width as usize + x as usize] == MASK_ON
    }

    /// Number of foreground pixels.
    pub fn coverage(&self) -> usize {
        self.data.iter().filter(|&&v| v == MASK_ON).count()
    }

    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.size.width, self.size.height, |x, y| {
            Luma([self.data[(y as usize) * self.size.width as usize + x as usize]])
        })
    }

    /// White foreground on transparent background, for clipboard export.
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.size.width, self.size.height, |x, y| {
            if self.is_set(x, y) {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 0])
            }
        })
    }
}

fn nearest(dst: u32, dst_len: u32, src_len: u32) -> u32 {
    if dst_len == src_len {
        return dst;
    }
    ((dst as u64 * src_len as u64) / dst_len as u64).min(src_len.saturating_sub(1) as u64) as u32
}
