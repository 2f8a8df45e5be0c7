//! Coordinate mapping between the display surface and image space.
//!
//! The image is fitted into the display area preserving its aspect ratio and
//! centered on both axes (letterboxed). A [`ViewportMapper`] is a snapshot of
//! that fit for one pair of sizes; it is rebuilt whenever either size changes
//! and cannot be built at all for an empty display area.

use crate::geometry::{DisplayPoint, DisplaySize, ImagePoint, ImageSize};

/// Derived scale and offset of a letterboxed image.
///
/// `scale_*` convert display distances into image pixels; `offset_*` locate
/// the top-left corner of the displayed image within the display area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMapper {
    image: ImageSize,
    display: DisplaySize,
    displayed: DisplaySize,
    transform: ViewportTransform,
}

impl ViewportMapper {
    /// Fits `image` into the display `area`.
    ///
    /// Returns `None` when either size is empty; no event may be mapped then.
    pub fn new(image: ImageSize, area: DisplaySize) -> Option<Self> {
        if image.is_empty() || area.is_empty() {
            return None;
        }

        let (iw, ih) = (image.width as f32, image.height as f32);
        let fit = (area.width / iw).min(area.height / ih);
        let displayed = DisplaySize::new(iw * fit, ih * fit);

        let transform = ViewportTransform {
            scale_x: iw / displayed.width,
            scale_y: ih / displayed.height,
            offset_x: (area.width - displayed.width) / 2.0,
            offset_y: (area.height - displayed.height) / 2.0,
        };

        tracing::debug!(
            image = ?image,
            display = ?area,
            transform = ?transform,
            "recomputed viewport transform"
        );

        Some(Self {
            image,
            display: area,
            displayed,
            transform,
        })
    }

    pub fn transform(&self) -> ViewportTransform {
        self.transform
    }

    pub fn image_size(&self) -> ImageSize {
        self.image
    }

    pub fn display_size(&self) -> DisplaySize {
        self.display
    }

    /// Top-left corner and size of the displayed image inside the display area.
    pub fn displayed_rect(&self) -> (DisplayPoint, DisplaySize) {
        (
            DisplayPoint::new(self.transform.offset_x, self.transform.offset_y),
            self.displayed,
        )
    }

    /// Maps a display position to the image pixel underneath it.
    ///
    /// Positions in the letterbox padding map to coordinates outside the image;
    /// use [`ViewportMapper::to_image_space_checked`] to reject those.
    pub fn to_image_space(&self, point: DisplayPoint) -> ImagePoint {
        let t = &self.transform;
        let x = (point.x - t.offset_x) * t.scale_x;
        let y = (point.y - t.offset_y) * t.scale_y;
        // floor, not truncation: padding left of the image must stay negative
        ImagePoint::new(x.floor() as i32, y.floor() as i32)
    }

    pub fn to_image_space_checked(&self, point: DisplayPoint) -> Option<ImagePoint> {
        let mapped = self.to_image_space(point);
        self.image.contains(mapped).then_some(mapped)
    }

    /// Maps the center of an image pixel onto the display surface.
    pub fn to_display_space(&self, point: ImagePoint) -> DisplayPoint {
        let t = &self.transform;
        DisplayPoint::new(
            (point.x as f32 + 0.5) / t.scale_x + t.offset_x,
            (point.y as f32 + 0.5) / t.scale_y + t.offset_y,
        )
    }
}
