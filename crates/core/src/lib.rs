//! Mask Shot Core Library
//!
//! Interactive prompt-based image segmentation: load an image, describe the
//! object of interest with the whole image, a bounding box or a set of points,
//! and have an external segmentation engine turn that prompt into a binary
//! mask.
//!
//! # Overview
//!
//! - **Coordinates**: letterboxed display-to-image mapping via [`viewport`]
//! - **Selection**: the per-mode selection state machine in [`selection`]
//! - **Inference**: prompt building, the engine boundary and background jobs
//!   via [`prompt`], [`engine`] and [`dispatcher`]
//! - **Output**: binary masks and overlay compositing via [`mask`] and
//!   [`compositor`]
//! - **User Interface**: the eframe frontend in [`ui`]
//!
//! # Quick Start
//!
//! ```ignore
//! use mask_shot_core::{MaskShot, ScriptedSelection};
//! use mask_shot_core::geometry::ImagePoint;
//!
//! let app = MaskShot::new()?;
//!
//! // Headless: one bounding-box job straight to disk
//! let selection = ScriptedSelection::BoundingBox(ImagePoint::new(10, 10), ImagePoint::new(50, 50));
//! app.segment_file("cat.png".as_ref(), &selection, "mask.png".as_ref())?;
//!
//! // Interactive
//! app.run_interactive(Some("cat.png".into()))?;
//! ```

pub mod compositor;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod image_processing;
pub mod mask;
pub mod prompt;
pub mod selection;
pub mod session;
pub mod ui;
pub mod viewport;

// Re-export primary types for convenience
pub use config::Config;
pub use engine::{CommandEngine, SegmentationEngine};
pub use error::{AppError, Result};
pub use mask::Mask;
pub use selection::SelectionMode;
pub use session::{ScriptedSelection, Session, SessionEvent};

use compositor::OverlayStyle;
use dispatcher::JobToken;
use geometry::ImageSize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// What a headless run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationSummary {
    pub token: JobToken,
    pub size: ImageSize,
    /// Number of foreground pixels.
    pub coverage: usize,
    pub elapsed: Duration,
}

/// Main entry point for the Mask Shot application.
///
/// Holds the configuration and the engine, and starts either the interactive
/// window or a single headless job.
pub struct MaskShot {
    config: Config,
    engine: Arc<dyn SegmentationEngine>,
}

impl MaskShot {
    /// Loads configuration from the environment (including `.env` files) and
    /// uses the configured engine program.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment configuration is missing or invalid.
    pub fn new() -> Result<Self> {
        Ok(Self::with_config(Config::load()?))
    }

    pub fn with_config(config: Config) -> Self {
        let engine = Arc::new(CommandEngine::from_config(&config));
        Self { config, engine }
    }

    /// Uses `engine` instead of spawning the configured program.
    pub fn with_engine(config: Config, engine: Arc<dyn SegmentationEngine>) -> Self {
        Self { config, engine }
    }

    /// Opens the segmentation window, optionally preloading `image`.
    ///
    /// The window segments with this instance's engine unless the saved
    /// settings name another program.
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be created.
    pub fn run_interactive(&self, image: Option<PathBuf>) -> Result<()> {
        ui::run_ui(self.config.clone(), Arc::clone(&self.engine), image)
    }

    /// Runs one segmentation job without a window and writes the mask.
    ///
    /// Blocks until the engine answers.
    ///
    /// # Errors
    ///
    /// Load, prompt, engine and save failures, in that order.
    pub fn segment_file(
        &self,
        input: &Path,
        selection: &ScriptedSelection,
        output: &Path,
    ) -> Result<SegmentationSummary> {
        let mut session = Session::with_engine(Arc::clone(&self.engine), &self.config, OverlayStyle::default());
        session.load_image(input)?;
        session.apply_script(selection)?;
        let token = session.segment()?;

        match session.wait_for_job() {
            Some(SessionEvent::MaskApplied { token, coverage, elapsed }) => {
                session.save_mask(output)?;
                let size = session.image().map(|img| img.size()).unwrap_or(ImageSize::new(0, 0));
                Ok(SegmentationSummary {
                    token,
                    size,
                    coverage,
                    elapsed,
                })
            }
            Some(SessionEvent::JobFailed { error, .. }) => Err(error),
            None => Err(AppError::engine(format!("job {} finished without a result", token))),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Loads a `.env` file if present. Call once at startup.
pub fn init() {
    let _ = dotenvy::dotenv();
}
