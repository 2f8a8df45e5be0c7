//! Segmentation engine boundary.
//!
//! The engine is a black box: it receives the path of an encoded copy of the
//! current image plus an optional geometric prompt, and answers with one
//! probability raster. [`CommandEngine`] talks to an external program over a
//! small JSON protocol:
//!
//! ```text
//! stdin:  {"image": "/tmp/mask-shot/input-3.png", "model": "sam2.1_b.pt",
//!          "width": 640, "height": 480,
//!          "prompt": {"kind": "bbox", "bbox": [10, 10, 50, 50]}}
//! stdout: {"masks": ["<base64 PNG>", ...]}   or   {"error": "<message>"}
//! ```
//!
//! Only the first returned mask is used.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::geometry::ImageSize;
use crate::image_processing::ImageProcessor;
use crate::prompt::Prompt;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Number of trailing stderr characters quoted in engine errors.
const STDERR_TAIL: usize = 400;

/// One inference call.
#[derive(Debug, Clone, Copy)]
pub struct EngineRequest<'a> {
    /// Freshly encoded copy of the current image.
    pub image_path: &'a Path,
    pub image_size: ImageSize,
    pub prompt: &'a Prompt,
}

/// A segmentation backend, called from a worker thread.
///
/// Implementations return a grayscale probability raster (0 = background,
/// 255 = certain foreground) at any resolution; the caller scales and
/// thresholds it into a full-resolution [`crate::mask::Mask`].
pub trait SegmentationEngine: Send + Sync {
    /// Short human-readable name for logs.
    fn name(&self) -> &str;

    fn segment(&self, request: &EngineRequest<'_>) -> Result<GrayImage>;
}

#[derive(Serialize)]
struct WireRequest<'a> {
    image: &'a Path,
    model: &'a str,
    width: u32,
    height: u32,
    prompt: WirePrompt,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum WirePrompt {
    None,
    Bbox { bbox: [i32; 4] },
    Points { points: Vec<[i32; 2]>, labels: Vec<u8> },
}

impl From<&Prompt> for WirePrompt {
    fn from(prompt: &Prompt) -> Self {
        match prompt {
            Prompt::None => Self::None,
            Prompt::BoundingBox { min, max } => Self::Bbox {
                bbox: [min.x, min.y, max.x, max.y],
            },
            Prompt::Points(points) => Self::Points {
                points: points.iter().map(|lp| [lp.point.x, lp.point.y]).collect(),
                labels: points.iter().map(|lp| lp.label.as_engine_label()).collect(),
            },
        }
    }
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    masks: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Runs an external program once per segmentation call.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    model: String,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>, model: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            model: model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.engine_program.clone(),
            config.engine_args.clone(),
            config.model_name.clone(),
        )
    }

    fn encode_request(&self, request: &EngineRequest<'_>) -> Result<Vec<u8>> {
        let wire = WireRequest {
            image: request.image_path,
            model: &self.model,
            width: request.image_size.width,
            height: request.image_size.height,
            prompt: WirePrompt::from(request.prompt),
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    async fn run(&self, payload: Vec<u8>) -> Result<std::process::Output> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::engine(format!("failed to start {}: {}", self.program, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::engine("engine stdin unavailable"))?;

        let write = async move {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());

        let output = output
            .map_err(|e| AppError::engine(format!("failed to wait for {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(AppError::engine(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        if let Err(e) = written {
            return Err(AppError::engine(format!("failed to send request: {}", e)));
        }

        Ok(output)
    }
}

impl SegmentationEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn segment(&self, request: &EngineRequest<'_>) -> Result<GrayImage> {
        let payload = self.encode_request(request)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AppError::engine(format!("Failed to create async runtime: {}", e)))?;

        let output = runtime.block_on(self.run(payload))?;
        parse_response(&output.stdout)
    }
}

/// Decodes the engine reply into the first probability raster.
fn parse_response(stdout: &[u8]) -> Result<GrayImage> {
    let response: WireResponse = serde_json::from_slice(stdout)
        .map_err(|e| AppError::engine(format!("unreadable engine reply: {}", e)))?;

    if let Some(message) = response.error {
        return Err(AppError::engine(message));
    }

    let first = response
        .masks
        .first()
        .ok_or_else(|| AppError::engine("engine returned no masks"))?;

    let png = BASE64
        .decode(first.trim())
        .map_err(|e| AppError::engine(format!("mask is not valid base64: {}", e)))?;

    ImageProcessor::decode_gray_png(&png).map_err(|e| AppError::engine(e.to_string()))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().rev().nth(STDERR_TAIL - 1) {
        Some((idx, _)) if idx > 0 => format!("...{}", &text[idx..]),
        _ => text.to_string(),
    }
}
