use image::{GrayImage, Luma, Rgb, RgbImage};
use mask_shot_core::compositor::OverlayStyle;
use mask_shot_core::engine::EngineRequest;
use mask_shot_core::events::InteractionListener;
use mask_shot_core::geometry::{DisplayPoint, DisplaySize, ImagePoint};
use mask_shot_core::prompt::{LabeledPoint, PointLabel, Prompt};
use mask_shot_core::{
    AppError, Config, MaskShot, Result, ScriptedSelection, SegmentationEngine, SelectionMode, Session,
    SessionEvent,
};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Fake engine answering with a raster that covers exactly the prompt.
#[derive(Default)]
struct ScriptedEngine {
    calls: Mutex<Vec<Prompt>>,
    gate: Mutex<Option<Receiver<()>>>,
}

impl ScriptedEngine {
    fn gated() -> (Arc<Self>, Sender<()>) {
        let (tx, rx) = channel();
        let engine = Self {
            gate: Mutex::new(Some(rx)),
            ..Self::default()
        };
        (Arc::new(engine), tx)
    }

    fn calls(&self) -> Vec<Prompt> {
        self.calls.lock().unwrap().clone()
    }
}

impl SegmentationEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn segment(&self, request: &EngineRequest<'_>) -> Result<GrayImage> {
        self.calls.lock().unwrap().push(request.prompt.clone());
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.recv().unwrap();
        }

        let size = request.image_size;
        let raster = GrayImage::from_fn(size.width, size.height, |x, y| {
            let (x, y) = (x as i32, y as i32);
            let hit = match request.prompt {
                Prompt::None => true,
                Prompt::BoundingBox { min, max } => (min.x..=max.x).contains(&x) && (min.y..=max.y).contains(&y),
                Prompt::Points(points) => points.iter().any(|lp| lp.point == ImagePoint::new(x, y)),
            };
            Luma([if hit { 230 } else { 20 }])
        });
        Ok(raster)
    }
}

fn config(dir: &TempDir) -> Config {
    Config::builder()
        .with_engine("scripted")
        .with_temp_dir(dir.path().join("engine"))
        .build()
        .unwrap()
}

fn write_image(dir: &TempDir, name: &str, width: u32, height: u32) -> std::path::PathBuf {
    let path = dir.path().join(name);
    RgbImage::from_pixel(width, height, Rgb([100, 100, 100]))
        .save(&path)
        .unwrap();
    path
}

/// Session over a 100x100 image shown at 100x100, so display and image
/// coordinates line up.
fn session_with_image(dir: &TempDir, engine: Arc<ScriptedEngine>) -> Session {
    let mut session = Session::with_engine(engine, &config(dir), OverlayStyle::default());
    session.load_image(&write_image(dir, "square.png", 100, 100)).unwrap();
    session.on_resize(DisplaySize::new(100.0, 100.0));
    session
}

fn at(x: f32, y: f32) -> DisplayPoint {
    DisplayPoint::new(x + 0.5, y + 0.5)
}

fn expect_mask(event: Option<SessionEvent>) -> usize {
    match event {
        Some(SessionEvent::MaskApplied { coverage, .. }) => coverage,
        other => panic!("expected an applied mask, got {other:?}"),
    }
}

#[test]
fn dragged_box_is_segmented() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let mut session = session_with_image(&dir, engine.clone());

    session.set_mode(SelectionMode::BoundingBox);
    session.on_press(at(10.0, 10.0));
    session.on_move(at(30.0, 20.0));
    session.on_move(at(50.0, 50.0));
    session.on_release(at(50.0, 50.0));
    session.segment().unwrap();

    assert_eq!(expect_mask(session.wait_for_job()), 41 * 41);
    assert_eq!(
        engine.calls(),
        vec![Prompt::BoundingBox {
            min: ImagePoint::new(10, 10),
            max: ImagePoint::new(50, 50),
        }]
    );

    let mask = session.mask().unwrap();
    assert!(mask.is_set(10, 10) && mask.is_set(50, 50));
    assert!(!mask.is_set(51, 50));

    let composed = session.compose().unwrap();
    assert_ne!(*composed.get_pixel(30, 30), Rgb([100, 100, 100]));
    assert_eq!(*composed.get_pixel(80, 80), Rgb([100, 100, 100]));
}

#[test]
fn reversed_drag_is_normalized() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let mut session = session_with_image(&dir, engine.clone());

    session.set_mode(SelectionMode::BoundingBox);
    session.on_press(at(50.0, 50.0));
    session.on_move(at(10.0, 10.0));
    session.on_release(at(10.0, 10.0));
    session.segment().unwrap();
    session.wait_for_job();

    assert_eq!(
        engine.calls(),
        vec![Prompt::BoundingBox {
            min: ImagePoint::new(10, 10),
            max: ImagePoint::new(50, 50),
        }]
    );
}

#[test]
fn clicked_points_are_positive_labels() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let mut session = session_with_image(&dir, engine.clone());

    session.set_mode(SelectionMode::Points);
    session.on_press(at(5.0, 5.0));
    session.on_release(at(5.0, 5.0));
    session.on_press(at(80.0, 80.0));
    session.on_release(at(80.0, 80.0));
    session.segment().unwrap();

    assert_eq!(expect_mask(session.wait_for_job()), 2);
    assert_eq!(
        engine.calls(),
        vec![Prompt::Points(vec![
            LabeledPoint {
                point: ImagePoint::new(5, 5),
                label: PointLabel::Positive,
            },
            LabeledPoint {
                point: ImagePoint::new(80, 80),
                label: PointLabel::Positive,
            },
        ])]
    );
}

#[test]
fn whole_image_needs_no_geometry() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let mut session = session_with_image(&dir, engine.clone());

    session.segment().unwrap();
    assert_eq!(expect_mask(session.wait_for_job()), 100 * 100);
    assert_eq!(engine.calls(), vec![Prompt::None]);
}

#[test]
fn empty_point_set_never_reaches_the_engine() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let mut session = session_with_image(&dir, engine.clone());

    session.set_mode(SelectionMode::Points);
    let err = session.segment().unwrap_err();

    assert!(matches!(err, AppError::InvalidPrompt(_)));
    assert!(session.wait_for_job().is_none());
    assert!(engine.calls().is_empty());
    assert!(session.mask().is_none());
}

#[test]
fn mask_arriving_after_clear_is_still_applied() {
    let dir = TempDir::new().unwrap();
    let (engine, release) = ScriptedEngine::gated();
    let mut session = session_with_image(&dir, engine);

    session.set_mode(SelectionMode::Points);
    session.on_press(at(20.0, 20.0));
    session.segment().unwrap();
    session.clear();
    assert!(session.selection().points().is_empty());

    release.send(()).unwrap();
    assert_eq!(expect_mask(session.wait_for_job()), 1);
    assert!(session.mask().is_some());
}

#[test]
fn mode_switch_drops_mask_and_geometry() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let mut session = session_with_image(&dir, engine);

    for mode in SelectionMode::ALL {
        session.set_mode(SelectionMode::Points);
        session.on_press(at(12.0, 12.0));
        session.segment().unwrap();
        expect_mask(session.wait_for_job());
        assert!(session.mask().is_some());

        session.set_mode(mode);
        assert!(session.mask().is_none(), "mask kept after switching to {mode:?}");
        assert_eq!(session.mode(), mode);
        assert!(session.selection().points().is_empty());
        assert!(session.selection().bounding_box().is_none());
    }
}

#[test]
fn clear_drops_mask_and_keeps_mode() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let mut session = session_with_image(&dir, engine);

    session.set_mode(SelectionMode::BoundingBox);
    session.on_press(at(10.0, 10.0));
    session.on_move(at(40.0, 40.0));
    session.on_release(at(40.0, 40.0));
    session.segment().unwrap();
    expect_mask(session.wait_for_job());

    session.clear();
    assert!(session.mask().is_none());
    assert_eq!(session.mode(), SelectionMode::BoundingBox);
    assert!(session.selection().bounding_box().is_none());
    assert_eq!(session.compose().unwrap().as_raw(), session.image().unwrap().pixels().as_raw());
}

#[test]
fn reloading_the_image_discards_running_jobs() {
    let dir = TempDir::new().unwrap();
    let (engine, release) = ScriptedEngine::gated();
    let mut session = session_with_image(&dir, engine);

    session.segment().unwrap();
    session.load_image(&write_image(&dir, "wide.png", 40, 20)).unwrap();

    release.send(()).unwrap();
    assert!(session.wait_for_job().is_none());
    assert!(session.mask().is_none());
    assert_eq!(session.jobs_in_flight(), 0);
}

#[test]
fn newer_job_supersedes_older_one() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let mut session = session_with_image(&dir, engine.clone());

    session.set_mode(SelectionMode::Points);
    session.on_press(at(1.0, 1.0));
    session.segment().unwrap();
    session.on_press(at(2.0, 2.0));
    let latest = session.segment().unwrap();

    match session.wait_for_job() {
        Some(SessionEvent::MaskApplied { token, coverage, .. }) => {
            assert_eq!(token, latest);
            assert_eq!(coverage, 2);
        }
        other => panic!("expected the latest mask, got {other:?}"),
    }
    assert!(session.wait_for_job().is_none());
}

#[test]
fn failed_load_keeps_the_previous_image() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let mut session = session_with_image(&dir, engine);

    session.set_mode(SelectionMode::Points);
    session.on_press(at(7.0, 7.0));

    let bogus = dir.path().join("notes.png");
    std::fs::write(&bogus, b"definitely not a png").unwrap();
    let err = session.load_image(&bogus).unwrap_err();

    assert!(matches!(err, AppError::ImageLoad { .. }));
    assert_eq!(session.image().unwrap().size().width, 100);
    assert_eq!(session.selection().points(), &[ImagePoint::new(7, 7)]);
}

#[test]
fn saved_mask_is_a_binary_grayscale_png() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let mut session = session_with_image(&dir, engine);

    assert!(matches!(session.save_mask(&dir.path().join("none.png")), Err(AppError::NoMask)));

    session.set_mode(SelectionMode::Points);
    session.on_press(at(3.0, 4.0));
    session.segment().unwrap();
    session.wait_for_job();

    let out = dir.path().join("mask.png");
    session.save_mask(&out).unwrap();
    let saved = image::open(&out).unwrap().to_luma8();
    assert_eq!(saved.dimensions(), (100, 100));
    assert_eq!(saved.get_pixel(3, 4).0, [255]);
    assert!(saved.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    assert_eq!(saved.pixels().filter(|p| p.0[0] == 255).count(), 1);
}

#[test]
fn headless_run_writes_the_mask() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let input = write_image(&dir, "input.png", 64, 48);
    let output = dir.path().join("out").join("mask.png");
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();

    let app = MaskShot::with_engine(config(&dir), engine.clone());
    let selection = ScriptedSelection::BoundingBox(ImagePoint::new(40, 30), ImagePoint::new(8, 8));
    let summary = app.segment_file(&input, &selection, &output).unwrap();

    assert_eq!((summary.size.width, summary.size.height), (64, 48));
    assert_eq!(summary.coverage, 33 * 23);
    assert!(Path::new(&output).exists());
    assert!(!dir.path().join("engine").join("engine-input-1.png").exists());
}

#[test]
fn headless_run_rejects_points_outside_the_image() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let input = write_image(&dir, "input.png", 10, 10);

    let app = MaskShot::with_engine(config(&dir), engine.clone());
    let selection = ScriptedSelection::Points(vec![ImagePoint::new(3, 3), ImagePoint::new(10, 3)]);
    let err = app
        .segment_file(&input, &selection, &dir.path().join("mask.png"))
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidPrompt(_)));
    assert!(engine.calls().is_empty());
}
