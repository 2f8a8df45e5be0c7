//! Canvas drawing helpers and conversions between egui and session types.

use super::state::{Notice, NoticeLevel};
use crate::geometry::{DisplayPoint, DisplaySize};
use crate::viewport::ViewportMapper;
use eframe::egui;
use image::RgbImage;

const CANVAS_BACKGROUND: egui::Color32 = egui::Color32::from_gray(30);

pub fn to_color_image(image: &RgbImage) -> egui::ColorImage {
    let size = [image.width() as usize, image.height() as usize];
    egui::ColorImage::from_rgb(size, image.as_raw())
}

/// Pointer position relative to the canvas origin.
pub fn to_display_point(canvas: egui::Rect, pos: egui::Pos2) -> DisplayPoint {
    DisplayPoint::new(pos.x - canvas.min.x, pos.y - canvas.min.y)
}

pub fn display_size(canvas: egui::Rect) -> DisplaySize {
    DisplaySize::new(canvas.width(), canvas.height())
}

/// Screen rectangle covered by the letterboxed image.
pub fn image_rect(canvas: egui::Rect, mapper: &ViewportMapper) -> egui::Rect {
    let (origin, size) = mapper.displayed_rect();
    egui::Rect::from_min_size(
        canvas.min + egui::vec2(origin.x, origin.y),
        egui::vec2(size.width, size.height),
    )
}

pub fn paint_background(painter: &egui::Painter, canvas: egui::Rect) {
    painter.rect_filled(canvas, 0.0, CANVAS_BACKGROUND);
}

pub fn paint_image(painter: &egui::Painter, texture: &egui::TextureHandle, rect: egui::Rect) {
    painter.image(
        texture.id(),
        rect,
        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
        egui::Color32::WHITE,
    );
}

pub fn paint_placeholder(painter: &egui::Painter, canvas: egui::Rect) {
    painter.text(
        canvas.center(),
        egui::Align2::CENTER_CENTER,
        "Load an image to start",
        egui::FontId::proportional(18.0),
        egui::Color32::from_white_alpha(160),
    );
}

/// Draws `notice` in the bottom-right corner of the canvas.
pub fn paint_notice(painter: &egui::Painter, canvas: egui::Rect, notice: &Notice) {
    let color = match notice.level {
        NoticeLevel::Info => egui::Color32::from_rgb(120, 200, 255),
        NoticeLevel::Warning => egui::Color32::from_rgb(255, 190, 60),
    };
    let galley = painter.layout_no_wrap(notice.text.clone(), egui::FontId::proportional(14.0), color);
    let padding = egui::vec2(10.0, 6.0);
    let size = galley.size() + padding * 2.0;
    let rect = egui::Rect::from_min_size(canvas.max - size - egui::vec2(12.0, 12.0), size);

    painter.rect_filled(rect, 4.0, egui::Color32::from_black_alpha(200));
    painter.rect_stroke(rect, 4.0, egui::Stroke::new(1.0, color), egui::StrokeKind::Inside);
    painter.galley(rect.min + padding, galley, color);
}
