//! The interactive segmentation session.
//!
//! A [`Session`] owns the image, the selection, the mask and the viewport, and
//! is driven from a single interaction thread. Display-space input arrives
//! through [`InteractionListener`]; engine results arrive through
//! [`Session::poll_jobs`], which is the only place the mask slot is written by
//! a job.

use crate::compositor::{OverlayCompositor, OverlayStyle};
use crate::config::Config;
use crate::dispatcher::{JobToken, SegmentationDispatcher, Waker};
use crate::engine::SegmentationEngine;
use crate::error::{AppError, PromptError, Result};
use crate::events::InteractionListener;
use crate::geometry::{DisplayPoint, DisplaySize, ImagePoint};
use crate::image_processing::{ImageProcessor, SourceImage};
use crate::mask::Mask;
use crate::prompt::build_prompt;
use crate::selection::{PointerEvent, Selection, SelectionMode, SelectionState, SelectionStateMachine};
use crate::viewport::ViewportMapper;
use image::{RgbImage, RgbaImage};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a finished job, for user-visible reporting.
#[derive(Debug)]
pub enum SessionEvent {
    MaskApplied {
        token: JobToken,
        coverage: usize,
        elapsed: Duration,
    },
    JobFailed {
        token: JobToken,
        error: AppError,
    },
}

/// A selection given up front in image coordinates, e.g. from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedSelection {
    All,
    BoundingBox(ImagePoint, ImagePoint),
    Points(Vec<ImagePoint>),
}

impl ScriptedSelection {
    fn mode(&self) -> SelectionMode {
        match self {
            Self::All => SelectionMode::All,
            Self::BoundingBox(..) => SelectionMode::BoundingBox,
            Self::Points(_) => SelectionMode::Points,
        }
    }

    fn events(&self) -> Vec<PointerEvent> {
        match self {
            Self::All => Vec::new(),
            Self::BoundingBox(a, b) => vec![
                PointerEvent::Press(*a),
                PointerEvent::Move(*b),
                PointerEvent::Release,
            ],
            Self::Points(points) => points.iter().copied().map(PointerEvent::Press).collect(),
        }
    }
}

pub struct Session {
    image: Option<Arc<SourceImage>>,
    machine: SelectionStateMachine,
    mask: Option<Mask>,
    display: Option<DisplaySize>,
    viewport: Option<ViewportMapper>,
    dispatcher: SegmentationDispatcher,
    compositor: OverlayCompositor,
    revision: u64,
}

impl Session {
    pub fn new(dispatcher: SegmentationDispatcher, style: OverlayStyle) -> Self {
        Self {
            image: None,
            machine: SelectionStateMachine::new(),
            mask: None,
            display: None,
            viewport: None,
            dispatcher,
            compositor: OverlayCompositor::new(style),
            revision: 0,
        }
    }

    pub fn with_engine(engine: Arc<dyn SegmentationEngine>, config: &Config, style: OverlayStyle) -> Self {
        let dispatcher = SegmentationDispatcher::new(engine, config.temp_dir.clone(), config.threshold);
        Self::new(dispatcher, style)
    }

    pub fn set_waker(&mut self, waker: Waker) {
        self.dispatcher.set_waker(waker);
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_deref()
    }

    pub fn selection(&self) -> &Selection {
        self.machine.selection()
    }

    pub fn mode(&self) -> SelectionMode {
        self.machine.mode()
    }

    pub fn state(&self) -> SelectionState {
        self.machine.state()
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn viewport(&self) -> Option<&ViewportMapper> {
        self.viewport.as_ref()
    }

    pub fn jobs_in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Counter bumped on every change to what [`Session::compose`] returns.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn overlay_style(&self) -> &OverlayStyle {
        self.compositor.style()
    }

    pub fn set_overlay_style(&mut self, style: OverlayStyle) {
        self.compositor.set_style(style);
        self.touch();
    }

    /// Decodes and installs the image at `path`.
    ///
    /// On failure the session is left exactly as it was.
    pub fn load_image(&mut self, path: &Path) -> Result<()> {
        let image = ImageProcessor::load(path)?;
        self.set_image(image);
        Ok(())
    }

    /// Replaces the image wholesale. The mask and the selection geometry are
    /// dropped, the mode is kept, and any running job is invalidated.
    pub fn set_image(&mut self, image: SourceImage) {
        self.image = Some(Arc::new(image));
        self.mask = None;
        self.machine.clear();
        self.dispatcher.invalidate();
        self.refresh_viewport();
        self.touch();
    }

    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.machine.set_mode(mode);
        self.mask = None;
        self.touch();
    }

    pub fn clear(&mut self) {
        self.machine.clear();
        self.mask = None;
        self.touch();
    }

    /// Feeds an image-space event to the selection machine.
    ///
    /// Presses and moves outside the image, and any event while no image is
    /// loaded, are ignored.
    pub fn handle_image_event(&mut self, event: PointerEvent) {
        let Some(image) = &self.image else {
            return;
        };
        let in_bounds = match event {
            PointerEvent::Press(p) | PointerEvent::Move(p) => image.size().contains(p),
            PointerEvent::Release => true,
        };
        if !in_bounds {
            tracing::trace!(event = ?event, "ignoring out-of-bounds pointer event");
            return;
        }

        let before = self.machine.clone();
        self.machine.handle(event);
        if self.machine != before {
            self.touch();
        }
    }

    /// Replaces the selection with `script` as if it had been drawn by hand.
    ///
    /// Unlike live pointer input, coordinates outside the image are an error
    /// rather than silently dropped.
    pub fn apply_script(&mut self, script: &ScriptedSelection) -> Result<()> {
        let size = self.image.as_ref().ok_or(AppError::NoImage)?.size();
        for event in script.events() {
            if let PointerEvent::Press(p) | PointerEvent::Move(p) = event {
                if !size.contains(p) {
                    return Err(PromptError::OutOfBounds { x: p.x, y: p.y }.into());
                }
            }
        }

        self.set_mode(script.mode());
        for event in script.events() {
            self.handle_image_event(event);
        }
        Ok(())
    }

    /// Builds the prompt for the current selection and dispatches it.
    ///
    /// # Errors
    ///
    /// [`AppError::NoImage`] without an image, [`AppError::InvalidPrompt`] for
    /// an unusable selection; in both cases no job is started.
    pub fn segment(&mut self) -> Result<JobToken> {
        let image = self.image.clone().ok_or(AppError::NoImage)?;
        let prompt = build_prompt(self.machine.selection()).inspect_err(|e| {
            tracing::warn!(reason = %e, mode = ?self.machine.mode(), "prompt rejected");
        })?;
        self.dispatcher.dispatch(image, prompt)
    }

    /// Applies finished jobs. Must run on the interaction thread.
    pub fn poll_jobs(&mut self) -> Vec<SessionEvent> {
        let completions = self.dispatcher.poll();
        completions
            .into_iter()
            .map(|c| self.apply(c.token, c.elapsed, c.result))
            .collect()
    }

    /// Blocks until the current job finishes and applies it.
    pub fn wait_for_job(&mut self) -> Option<SessionEvent> {
        let completion = self.dispatcher.wait()?;
        Some(self.apply(completion.token, completion.elapsed, completion.result))
    }

    fn apply(&mut self, token: JobToken, elapsed: Duration, result: Result<Mask>) -> SessionEvent {
        let mask = match result {
            Ok(mask) => mask,
            Err(error) => return SessionEvent::JobFailed { token, error },
        };

        let expected = self.image.as_ref().map(|img| img.size());
        if expected != Some(mask.size()) {
            return SessionEvent::JobFailed {
                token,
                error: AppError::engine(format!(
                    "mask is {}x{} but the current image is {:?}",
                    mask.width(),
                    mask.height(),
                    expected
                )),
            };
        }

        let coverage = mask.coverage();
        self.mask = Some(mask);
        self.touch();
        SessionEvent::MaskApplied {
            token,
            coverage,
            elapsed,
        }
    }

    /// Current display raster at source resolution, or `None` without image.
    pub fn compose(&self) -> Option<RgbImage> {
        let image = self.image.as_deref()?;
        Some(self.compositor.compose(image, self.machine.selection(), self.mask.as_ref()))
    }

    pub fn save_mask(&self, path: &Path) -> Result<()> {
        let mask = self.mask.as_ref().ok_or(AppError::NoMask)?;
        ImageProcessor::save_mask(path, mask)
    }

    pub fn mask_as_rgba(&self) -> Option<RgbaImage> {
        self.mask.as_ref().map(Mask::to_rgba_image)
    }

    fn refresh_viewport(&mut self) {
        self.viewport = match (&self.image, self.display) {
            (Some(image), Some(display)) => ViewportMapper::new(image.size(), display),
            _ => None,
        };
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

impl InteractionListener for Session {
    fn on_press(&mut self, position: DisplayPoint) {
        if let Some(point) = self.viewport.and_then(|v| v.to_image_space_checked(position)) {
            self.handle_image_event(PointerEvent::Press(point));
        }
    }

    fn on_move(&mut self, position: DisplayPoint) {
        if let Some(point) = self.viewport.and_then(|v| v.to_image_space_checked(position)) {
            self.handle_image_event(PointerEvent::Move(point));
        }
    }

    fn on_release(&mut self, _position: DisplayPoint) {
        self.handle_image_event(PointerEvent::Release);
    }

    fn on_resize(&mut self, size: DisplaySize) {
        if self.display == Some(size) {
            return;
        }
        self.display = Some(size);
        self.refresh_viewport();
    }
}
