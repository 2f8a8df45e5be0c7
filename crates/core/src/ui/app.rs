//! Main segmentation window.
//!
//! The side panel holds the controls, the central panel is the letterboxed
//! canvas. Pointer input on the canvas is forwarded to the [`Session`] through
//! [`InteractionListener`]; finished jobs are polled once per frame.

use super::rendering::{
    display_size, image_rect, paint_background, paint_image, paint_notice, paint_placeholder,
    to_color_image, to_display_point,
};
use super::settings::Settings;
use super::state::{DialogEvent, Feedback, Notice, PointerInput, UiState};
use crate::error::{AppError, Result};
use crate::events::InteractionListener;
use crate::image_processing::SUPPORTED_EXTENSIONS;
use crate::selection::SelectionMode;
use crate::session::{Session, SessionEvent};
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::Instant;

pub struct MaskShotApp {
    session: Session,
    settings: Settings,
    state: UiState,
    notice: Option<Notice>,
    texture: Option<egui::TextureHandle>,
    texture_revision: Option<u64>,
    dialog_tx: Sender<DialogEvent>,
    dialog_rx: Receiver<DialogEvent>,
    show_settings: bool,
}

impl MaskShotApp {
    pub fn new(ctx: &egui::Context, mut session: Session, settings: Settings) -> Self {
        let repaint = ctx.clone();
        session.set_waker(Arc::new(move || repaint.request_repaint()));
        session.set_overlay_style(settings.overlay);

        let (dialog_tx, dialog_rx) = channel();
        Self {
            session,
            settings,
            state: UiState::Idle,
            notice: None,
            texture: None,
            texture_revision: None,
            dialog_tx,
            dialog_rx,
            show_settings: false,
        }
    }

    fn report(&mut self, err: AppError) {
        match Feedback::for_error(&err) {
            Feedback::Toast(notice) => self.notice = Some(notice),
            Feedback::Modal(message) => self.state = UiState::Error(message),
        }
    }

    fn report_result(&mut self, result: Result<()>) {
        if let Err(e) = result {
            self.report(e);
        }
    }

    fn pick_image(&self) {
        let tx = self.dialog_tx.clone();
        let start = self.settings.last_dir.clone();
        thread::spawn(move || {
            let mut dialog = rfd::FileDialog::new().add_filter("Images", SUPPORTED_EXTENSIONS);
            if let Some(dir) = start {
                dialog = dialog.set_directory(dir);
            }
            if let Some(path) = dialog.pick_file() {
                let _ = tx.send(DialogEvent::Open(path));
            }
        });
    }

    fn pick_mask_target(&self) {
        let tx = self.dialog_tx.clone();
        let start = self.settings.last_dir.clone();
        thread::spawn(move || {
            let mut dialog = rfd::FileDialog::new()
                .add_filter("PNG", &["png"])
                .set_file_name("mask.png");
            if let Some(dir) = start {
                dialog = dialog.set_directory(dir);
            }
            if let Some(path) = dialog.save_file() {
                let _ = tx.send(DialogEvent::SaveMask(path));
            }
        });
    }

    pub fn open(&mut self, path: PathBuf) {
        match self.session.load_image(&path) {
            Ok(()) => {
                self.settings.remember_dir(&path);
                self.persist_settings();
            }
            Err(e) => self.report(e),
        }
    }

    fn save_mask(&mut self, path: PathBuf) {
        match self.session.save_mask(&path) {
            Ok(()) => self.notice = Some(Notice::info(format!("Mask saved to {}", path.display()))),
            Err(e) => self.report(e),
        }
    }

    fn copy_mask(&mut self) -> Result<()> {
        let rgba = self.session.mask_as_rgba().ok_or(AppError::NoMask)?;
        let mut clipboard = arboard::Clipboard::new().map_err(|e| AppError::Clipboard(e.to_string()))?;
        clipboard
            .set_image(arboard::ImageData {
                width: rgba.width() as usize,
                height: rgba.height() as usize,
                bytes: std::borrow::Cow::Borrowed(rgba.as_raw()),
            })
            .map_err(|e| AppError::Clipboard(e.to_string()))?;
        self.notice = Some(Notice::info("Mask copied to clipboard"));
        Ok(())
    }

    fn persist_settings(&self) {
        if let Err(e) = self.settings.save() {
            tracing::warn!(error = %e, "failed to save settings");
        }
    }

    fn process_dialog_events(&mut self) {
        while let Ok(event) = self.dialog_rx.try_recv() {
            match event {
                DialogEvent::Open(path) => self.open(path),
                DialogEvent::SaveMask(path) => self.save_mask(path),
            }
        }
    }

    fn process_session_events(&mut self) {
        for event in self.session.poll_jobs() {
            match event {
                SessionEvent::MaskApplied { .. } => {}
                SessionEvent::JobFailed { error, .. } => self.report(error),
            }
        }
    }

    fn refresh_texture(&mut self, ctx: &egui::Context) {
        let revision = self.session.revision();
        if self.texture_revision == Some(revision) {
            return;
        }
        self.texture_revision = Some(revision);

        self.texture = self.session.compose().map(|composed| {
            ctx.load_texture("canvas", to_color_image(&composed), egui::TextureOptions::LINEAR)
        });
    }

    fn render_controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("Mask Shot");
        ui.separator();

        if ui.button("Load image...").clicked() {
            self.pick_image();
        }
        if let Some(image) = self.session.image() {
            let name = image
                .path()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            ui.label(name);
            ui.small(format!("{}x{}", image.size().width, image.size().height));
        }

        ui.add_space(8.0);
        ui.label("Selection");
        let mut mode = self.session.mode();
        for candidate in SelectionMode::ALL {
            // re-selecting the current mode still clears the selection
            if ui.radio_value(&mut mode, candidate, candidate.label()).clicked() {
                self.session.set_mode(candidate);
            }
        }

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("Segment").clicked() {
                if let Err(e) = self.session.segment() {
                    self.report(e);
                }
            }
            if self.session.jobs_in_flight() > 0 {
                ui.spinner();
            }
        });
        if ui.button("Clear").clicked() {
            self.session.clear();
        }

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("Save mask...").clicked() {
                if self.session.mask().is_some() {
                    self.pick_mask_target();
                } else {
                    self.report(AppError::NoMask);
                }
            }
            if ui.button("Copy mask").clicked() {
                let result = self.copy_mask();
                self.report_result(result);
            }
        });

        if let Some(mask) = self.session.mask() {
            let total = (mask.width() as usize * mask.height() as usize).max(1);
            ui.small(format!("Mask covers {:.1}%", mask.coverage() as f32 * 100.0 / total as f32));
        }

        ui.add_space(8.0);
        ui.checkbox(&mut self.show_settings, "Settings");
        if self.show_settings {
            self.render_settings(ui);
        }
    }

    fn render_settings(&mut self, ui: &mut egui::Ui) {
        let before = self.settings.clone();
        let overlay = &mut self.settings.overlay;

        ui.horizontal(|ui| {
            ui.color_edit_button_srgb(&mut overlay.box_color);
            ui.label("Box");
        });
        ui.add(egui::Slider::new(&mut overlay.box_stroke, 1..=8).text("Stroke"));
        ui.horizontal(|ui| {
            ui.color_edit_button_srgb(&mut overlay.point_color);
            ui.label("Points");
        });
        ui.add(egui::Slider::new(&mut overlay.point_radius, 1..=20).text("Radius"));
        ui.horizontal(|ui| {
            ui.color_edit_button_srgb(&mut overlay.mask_color);
            ui.label("Mask");
        });
        ui.add(egui::Slider::new(&mut overlay.mask_opacity, 0.0..=1.0).text("Opacity"));

        ui.label("Engine override (next launch):");
        ui.text_edit_singleline(&mut self.settings.engine_override);

        if self.settings != before {
            self.session.set_overlay_style(self.settings.overlay);
            self.persist_settings();
        }
    }

    fn render_canvas(&mut self, ui: &mut egui::Ui) {
        let canvas = ui.available_rect_before_wrap();
        let response = ui.allocate_rect(canvas, egui::Sense::click_and_drag());
        let painter = ui.painter_at(canvas);
        paint_background(&painter, canvas);

        self.session.on_resize(display_size(canvas));

        let accepting = matches!(self.state, UiState::Idle);
        for event in pointer_input(ui, canvas, &response).events(accepting) {
            event.deliver(&mut self.session);
        }
        self.refresh_texture(ui.ctx());

        match (&self.texture, self.session.viewport()) {
            (Some(texture), Some(mapper)) => paint_image(&painter, texture, image_rect(canvas, mapper)),
            _ => paint_placeholder(&painter, canvas),
        }

        if let Some(notice) = &self.notice {
            paint_notice(&painter, canvas, notice);
        }
    }

    fn render_error_modal(&mut self, ctx: &egui::Context) {
        let UiState::Error(message) = &self.state else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(message).color(egui::Color32::RED));
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.state = UiState::Idle;
        }
    }
}

fn pointer_input(ui: &egui::Ui, canvas: egui::Rect, response: &egui::Response) -> PointerInput {
    ui.input(|i| PointerInput {
        position: i.pointer.interact_pos().map(|pos| to_display_point(canvas, pos)),
        pressed: i.pointer.primary_pressed(),
        down: i.pointer.primary_down(),
        released: i.pointer.primary_released(),
        moving: i.pointer.is_moving(),
        hovered: response.hovered(),
    })
}

impl eframe::App for MaskShotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(egui::Visuals::dark());

        self.process_dialog_events();
        self.process_session_events();

        if self.notice.as_ref().is_some_and(|n| n.is_expired(Instant::now())) {
            self.notice = None;
        }

        egui::SidePanel::left("controls")
            .resizable(false)
            .default_width(180.0)
            .show(ctx, |ui| self.render_controls(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::default())
            .show(ctx, |ui| self.render_canvas(ui));

        self.render_error_modal(ctx);

        if self.notice.is_some() || self.session.jobs_in_flight() > 0 {
            ctx.request_repaint_after(std::time::Duration::from_millis(250));
        }
    }
}
