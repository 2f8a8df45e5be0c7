//! Overlay compositing.
//!
//! Builds the display raster at source resolution: base image, then selection
//! markers, then the mask tint on top. The output depends only on the inputs,
//! so repeated calls with unchanged inputs are bit-identical.

use crate::image_processing::SourceImage;
use crate::mask::Mask;
use crate::selection::{BoundingBox, Selection};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Fixed colors and sizes of the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub box_color: [u8; 3],
    pub box_stroke: u32,
    pub point_color: [u8; 3],
    pub point_radius: u32,
    pub mask_color: [u8; 3],
    /// Mask tint opacity in 0..=1.
    pub mask_opacity: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            box_color: [0, 255, 0],
            box_stroke: 2,
            point_color: [255, 0, 0],
            point_radius: 5,
            mask_color: [0, 255, 0],
            mask_opacity: 0.3,
        }
    }
}

pub struct OverlayCompositor {
    style: OverlayStyle,
}

impl OverlayCompositor {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn set_style(&mut self, style: OverlayStyle) {
        self.style = style;
    }

    pub fn compose(&self, image: &SourceImage, selection: &Selection, mask: Option<&Mask>) -> RgbImage {
        let mut canvas = image.pixels().clone();

        match selection {
            Selection::BoundingBox(Some(rect)) => {
                draw_rect_outline(&mut canvas, rect, Rgb(self.style.box_color), self.style.box_stroke);
            }
            Selection::Points(points) => {
                for point in points {
                    draw_filled_circle(
                        &mut canvas,
                        point.x as i64,
                        point.y as i64,
                        self.style.point_radius as i64,
                        Rgb(self.style.point_color),
                    );
                }
            }
            _ => {}
        }

        if let Some(mask) = mask {
            tint_masked(&mut canvas, mask, Rgb(self.style.mask_color), self.style.mask_opacity);
        }

        canvas
    }
}

impl Default for OverlayCompositor {
    fn default() -> Self {
        Self::new(OverlayStyle::default())
    }
}

fn put_clipped(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < img.width() as i64 && y < img.height() as i64 {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Outline through both corners; extra stroke width grows outward.
fn draw_rect_outline(img: &mut RgbImage, rect: &BoundingBox, color: Rgb<u8>, stroke: u32) {
    let (min, max) = rect.normalized();
    let (x0, y0, x1, y1) = (min.x as i64, min.y as i64, max.x as i64, max.y as i64);

    for t in 0..stroke.max(1) as i64 {
        let (tx0, ty0, tx1, ty1) = (x0 - t, y0 - t, x1 + t, y1 + t);
        for x in tx0..=tx1 {
            put_clipped(img, x, ty0, color);
            put_clipped(img, x, ty1, color);
        }
        for y in ty0..=ty1 {
            put_clipped(img, tx0, y, color);
            put_clipped(img, tx1, y, color);
        }
    }
}

fn draw_filled_circle(img: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                put_clipped(img, cx + dx, cy + dy, color);
            }
        }
    }
}

fn tint_masked(img: &mut RgbImage, mask: &Mask, color: Rgb<u8>, opacity: f32) {
    let alpha = opacity.clamp(0.0, 1.0);
    let inv = 1.0 - alpha;
    for (x, y, px) in img.enumerate_pixels_mut() {
        if !mask.is_set(x, y) {
            continue;
        }
        for c in 0..3 {
            let blended = f32::from(px.0[c]) * inv + f32::from(color.0[c]) * alpha;
            px.0[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}
