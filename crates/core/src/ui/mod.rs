//! Interactive frontend.
//!
//! # Architecture
//!
//! - [`state`]: notification routing and modal state
//! - [`settings`]: user preferences and persistence
//! - [`rendering`]: canvas drawing and egui conversions
//! - [`app`]: the eframe application driving a [`Session`]

mod app;
mod rendering;
mod settings;
mod state;

pub use app::MaskShotApp;
pub use settings::Settings;
pub use state::{Notice, NoticeLevel, UiState};

use crate::compositor::OverlayStyle;
use crate::config::Config;
use crate::engine::{CommandEngine, SegmentationEngine};
use crate::error::{AppError, Result};
use crate::session::Session;
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;

/// Opens the segmentation window and blocks until it is closed.
///
/// `image`, if given, is loaded before the first frame; a failed load is
/// reported inside the window instead of aborting.
pub fn run_ui(mut config: Config, engine: Arc<dyn SegmentationEngine>, image: Option<PathBuf>) -> Result<()> {
    let settings = Settings::load();
    let engine = select_engine(engine, &mut config, &settings);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 760.0])
            .with_min_inner_size([480.0, 360.0])
            .with_title("Mask Shot"),
        ..Default::default()
    };

    eframe::run_native(
        "mask-shot",
        options,
        Box::new(move |cc| {
            let session = Session::with_engine(engine, &config, OverlayStyle::default());
            let mut app = MaskShotApp::new(&cc.egui_ctx, session, settings);
            if let Some(path) = image {
                app.open(path);
            }
            Ok(Box::new(app) as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| AppError::ui(format!("Failed to run UI: {}", e)))
}

/// Swaps in a command engine when the settings name a different program.
fn select_engine(
    engine: Arc<dyn SegmentationEngine>,
    config: &mut Config,
    settings: &Settings,
) -> Arc<dyn SegmentationEngine> {
    match settings.engine_override() {
        Some(program) if program != config.engine_program => {
            tracing::info!(engine = program, "using engine from settings");
            config.engine_program = program.to_string();
            Arc::new(CommandEngine::from_config(config))
        }
        _ => engine,
    }
}
