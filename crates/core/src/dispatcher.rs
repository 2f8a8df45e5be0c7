//! Asynchronous segmentation jobs.
//!
//! Every dispatch runs on its own worker thread and reports back through a
//! channel that only the interaction thread drains, so the mask slot is written
//! from a single place. Each job carries a [`JobToken`]; the dispatcher keeps
//! the token of the most recent dispatch and discards completions of older
//! jobs instead of letting the slowest job overwrite a newer mask.

use crate::engine::{EngineRequest, SegmentationEngine};
use crate::error::{AppError, Result};
use crate::image_processing::{ImageProcessor, SourceImage};
use crate::mask::Mask;
use crate::prompt::Prompt;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Identity of one dispatched job, increasing per dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobToken(u64);

impl fmt::Display for JobToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything a worker needs for one engine call.
#[derive(Debug, Clone)]
pub struct SegmentationJob {
    pub token: JobToken,
    pub image: Arc<SourceImage>,
    pub prompt: Prompt,
    pub issued_at: Instant,
}

/// Result of one job, delivered on the interaction thread.
#[derive(Debug)]
pub struct JobCompletion {
    pub token: JobToken,
    pub elapsed: Duration,
    pub result: Result<Mask>,
}

/// Callback invoked from the worker thread after its result is queued.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

pub struct SegmentationDispatcher {
    engine: Arc<dyn SegmentationEngine>,
    temp_dir: PathBuf,
    threshold: f32,
    tx: Sender<JobCompletion>,
    rx: Receiver<JobCompletion>,
    next_token: u64,
    latest: Option<JobToken>,
    in_flight: usize,
    waker: Option<Waker>,
}

impl SegmentationDispatcher {
    pub fn new(engine: Arc<dyn SegmentationEngine>, temp_dir: impl Into<PathBuf>, threshold: f32) -> Self {
        let (tx, rx) = channel();
        Self {
            engine,
            temp_dir: temp_dir.into(),
            threshold,
            tx,
            rx,
            next_token: 0,
            latest: None,
            in_flight: 0,
            waker: None,
        }
    }

    /// Registers a callback run on the worker after each completion, e.g. to
    /// request a repaint of the interaction thread.
    pub fn set_waker(&mut self, waker: Waker) {
        self.waker = Some(waker);
    }

    pub fn latest(&self) -> Option<JobToken> {
        self.latest
    }

    /// Jobs dispatched whose completion has not been received yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Forgets the latest token so that every job still running is discarded
    /// when it completes. Running jobs are not stopped.
    pub fn invalidate(&mut self) {
        if let Some(token) = self.latest.take() {
            tracing::debug!(%token, in_flight = self.in_flight, "invalidated pending jobs");
        }
    }

    /// Starts `prompt` against `image` on a new worker thread.
    pub fn dispatch(&mut self, image: Arc<SourceImage>, prompt: Prompt) -> Result<JobToken> {
        self.next_token += 1;
        let job = SegmentationJob {
            token: JobToken(self.next_token),
            image,
            prompt,
            issued_at: Instant::now(),
        };
        let token = job.token;

        let engine = Arc::clone(&self.engine);
        let input_path = self.temp_dir.join(format!("engine-input-{}.png", token.0));
        let threshold = self.threshold;
        let tx = self.tx.clone();
        let waker = self.waker.clone();

        tracing::info!(
            %token,
            engine = engine.name(),
            prompt = job.prompt.kind(),
            "dispatching segmentation job"
        );

        thread::Builder::new()
            .name(format!("mask-shot-job-{}", token.0))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_job(engine.as_ref(), &job, &input_path, threshold)
                }))
                .unwrap_or_else(|_| Err(AppError::engine("segmentation engine panicked")));

                let _ = tx.send(JobCompletion {
                    token: job.token,
                    elapsed: job.issued_at.elapsed(),
                    result,
                });
                if let Some(wake) = waker {
                    wake();
                }
            })?;

        self.latest = Some(token);
        self.in_flight += 1;
        Ok(token)
    }

    /// Drains finished jobs without blocking, returning those still current.
    pub fn poll(&mut self) -> Vec<JobCompletion> {
        let mut accepted = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            if let Some(completion) = self.accept(completion) {
                accepted.push(completion);
            }
        }
        accepted
    }

    /// Blocks until the next current job completes.
    ///
    /// Returns `None` once nothing is in flight.
    pub fn wait(&mut self) -> Option<JobCompletion> {
        while self.in_flight > 0 {
            let completion = self.rx.recv().ok()?;
            if let Some(completion) = self.accept(completion) {
                return Some(completion);
            }
        }
        None
    }

    fn accept(&mut self, completion: JobCompletion) -> Option<JobCompletion> {
        self.in_flight = self.in_flight.saturating_sub(1);

        if Some(completion.token) != self.latest {
            tracing::warn!(
                token = %completion.token,
                latest = ?self.latest,
                "discarding result of superseded job"
            );
            return None;
        }

        match &completion.result {
            Ok(mask) => tracing::info!(
                token = %completion.token,
                elapsed_ms = completion.elapsed.as_millis() as u64,
                coverage = mask.coverage(),
                "segmentation job finished"
            ),
            Err(e) => tracing::error!(token = %completion.token, error = %e, "segmentation job failed"),
        }
        Some(completion)
    }
}

fn run_job(
    engine: &dyn SegmentationEngine,
    job: &SegmentationJob,
    input_path: &Path,
    threshold: f32,
) -> Result<Mask> {
    ImageProcessor::write_engine_input(&job.image, input_path)?;

    let request = EngineRequest {
        image_path: input_path,
        image_size: job.image.size(),
        prompt: &job.prompt,
    };
    let raster = engine.segment(&request);

    if let Err(e) = std::fs::remove_file(input_path) {
        tracing::debug!(path = %input_path.display(), error = %e, "could not remove engine input");
    }

    Ok(Mask::from_probabilities(&raster?, job.image.size(), threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ImageSize;
    use image::{GrayImage, RgbImage};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine that blocks each call until released through its gate.
    struct GatedEngine {
        gates: Mutex<Vec<Receiver<u8>>>,
    }

    impl SegmentationEngine for GatedEngine {
        fn name(&self) -> &str {
            "gated"
        }

        fn segment(&self, request: &EngineRequest<'_>) -> Result<GrayImage> {
            assert!(request.image_path.exists(), "engine input must exist during the call");
            let gate = self.gates.lock().unwrap().remove(0);
            let value = gate.recv().unwrap();
            Ok(GrayImage::from_pixel(2, 2, image::Luma([value])))
        }
    }

    struct FailingEngine;

    impl SegmentationEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }

        fn segment(&self, _request: &EngineRequest<'_>) -> Result<GrayImage> {
            Err(AppError::engine("out of memory"))
        }
    }

    struct PanickingEngine;

    impl SegmentationEngine for PanickingEngine {
        fn name(&self) -> &str {
            "panicking"
        }

        fn segment(&self, _request: &EngineRequest<'_>) -> Result<GrayImage> {
            panic!("boom")
        }
    }

    fn image() -> Arc<SourceImage> {
        Arc::new(SourceImage::new(RgbImage::new(4, 4)))
    }

    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn completed_job_yields_full_resolution_mask() {
        let (release, gate) = channel();
        let engine = Arc::new(GatedEngine {
            gates: Mutex::new(vec![gate]),
        });
        let dir = temp_dir();
        let mut dispatcher = SegmentationDispatcher::new(engine, dir.path(), 0.5);

        let token = dispatcher.dispatch(image(), Prompt::None).unwrap();
        assert_eq!(dispatcher.in_flight(), 1);
        release.send(255).unwrap();

        let completion = dispatcher.wait().expect("job should complete");
        assert_eq!(completion.token, token);
        let mask = completion.result.unwrap();
        assert_eq!(mask.size(), ImageSize::new(4, 4));
        assert_eq!(mask.coverage(), 16);
        assert_eq!(dispatcher.in_flight(), 0);
        assert!(dispatcher.wait().is_none());
    }

    #[test]
    fn engine_input_is_removed_after_the_call() {
        let (release, gate) = channel();
        let engine = Arc::new(GatedEngine {
            gates: Mutex::new(vec![gate]),
        });
        let dir = temp_dir();
        let mut dispatcher = SegmentationDispatcher::new(engine, dir.path(), 0.5);

        dispatcher.dispatch(image(), Prompt::None).unwrap();
        release.send(0).unwrap();
        dispatcher.wait().unwrap().result.unwrap();

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn older_job_finishing_last_is_discarded() {
        let (release_first, first_gate) = channel();
        let (release_second, second_gate) = channel();
        let engine = Arc::new(GatedEngine {
            gates: Mutex::new(vec![first_gate, second_gate]),
        });
        let dir = temp_dir();
        let mut dispatcher = SegmentationDispatcher::new(engine.clone(), dir.path(), 0.5);

        let first = dispatcher.dispatch(image(), Prompt::None).unwrap();
        // let the first worker take its gate before the second one starts
        while engine.gates.lock().unwrap().len() > 1 {
            thread::yield_now();
        }
        let second = dispatcher.dispatch(image(), Prompt::None).unwrap();
        assert!(second > first);

        release_second.send(255).unwrap();
        let completion = dispatcher.wait().unwrap();
        assert_eq!(completion.token, second);

        release_first.send(0).unwrap();
        assert!(dispatcher.wait().is_none());
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[test]
    fn invalidate_discards_running_job() {
        let dir = temp_dir();
        let mut dispatcher = SegmentationDispatcher::new(Arc::new(FailingEngine), dir.path(), 0.5);
        dispatcher.dispatch(image(), Prompt::None).unwrap();
        dispatcher.invalidate();
        assert!(dispatcher.wait().is_none());
    }

    #[test]
    fn engine_errors_are_delivered_not_raised() {
        let dir = temp_dir();
        let mut dispatcher = SegmentationDispatcher::new(Arc::new(FailingEngine), dir.path(), 0.5);
        dispatcher.dispatch(image(), Prompt::None).unwrap();
        let err = dispatcher.wait().unwrap().result.unwrap_err();
        assert_eq!(err.to_string(), "Segmentation engine error: out of memory");
    }

    #[test]
    fn engine_panics_become_errors() {
        let dir = temp_dir();
        let mut dispatcher = SegmentationDispatcher::new(Arc::new(PanickingEngine), dir.path(), 0.5);
        dispatcher.dispatch(image(), Prompt::None).unwrap();
        let err = dispatcher.wait().unwrap().result.unwrap_err();
        assert!(matches!(err, AppError::Engine(_)));
    }

    #[test]
    fn waker_runs_after_completion() {
        let dir = temp_dir();
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let mut dispatcher = SegmentationDispatcher::new(Arc::new(FailingEngine), dir.path(), 0.5);
        dispatcher.set_waker(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        dispatcher.dispatch(image(), Prompt::None).unwrap();
        dispatcher.wait().unwrap();
        // the waker runs right after the send, give it a moment
        let deadline = Instant::now() + Duration::from_secs(5);
        while wakes.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::yield_now();
        }
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
    }
}
