//! Error types for the mask-shot-core library.
//!
//! This module provides granular error variants for the failure modes of the
//! selection and segmentation workflow, so frontends can pick between a blocking
//! notification and a lightweight warning.

use std::path::PathBuf;
use thiserror::Error;

/// Reasons a prompt is rejected before a job is dispatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    /// Point mode was dispatched without any recorded point.
    #[error("Add at least one point before segmenting")]
    EmptyPointSet,

    /// Box mode was dispatched before any box was drawn.
    #[error("Draw a bounding box before segmenting")]
    NoBoundingBox,

    /// The drawn box has no area after normalization.
    #[error("Bounding box is degenerate: {width}x{height}")]
    DegenerateBoundingBox { width: i32, height: i32 },

    /// A scripted selection names a pixel outside the image.
    #[error("Point ({x}, {y}) lies outside the image")]
    OutOfBounds { x: i32, y: i32 },
}

/// Errors that can occur within the mask-shot-core library.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (missing keys, invalid values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required environment variable was not found.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// The image at `path` could not be read or decoded.
    #[error("Failed to load image {}: {reason}", path.display())]
    ImageLoad { path: PathBuf, reason: String },

    /// The mask could not be encoded or written to `path`.
    #[error("Failed to save mask {}: {reason}", path.display())]
    ImageSave { path: PathBuf, reason: String },

    /// In-memory image encoding/decoding failed.
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    /// The segmentation engine failed or returned unusable output.
    #[error("Segmentation engine error: {0}")]
    Engine(String),

    /// The current selection cannot be turned into an engine prompt.
    #[error("Invalid prompt: {0}")]
    InvalidPrompt(#[from] PromptError),

    /// An operation needs a loaded image.
    #[error("No image loaded")]
    NoImage,

    /// An operation needs a mask but none has been produced yet.
    #[error("Create a mask first")]
    NoMask,

    /// System clipboard access failed.
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// UI-related errors (rendering, window management).
    #[error("UI error: {0}")]
    Ui(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How loudly an error should be surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Transient hint; the user simply has to adjust the selection.
    Warning,
    /// Modal notification; the operation was aborted.
    Blocking,
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an image processing error with the given message.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::ImageProcessing(msg.into())
    }

    /// Creates a segmentation engine error with the given message.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Creates a UI error with the given message.
    pub fn ui(msg: impl Into<String>) -> Self {
        Self::Ui(msg.into())
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::InvalidPrompt(_) | Self::NoMask | Self::NoImage => Severity::Warning,
            _ => Severity::Blocking,
        }
    }
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_errors_are_warnings() {
        let err = AppError::from(PromptError::EmptyPointSet);
        assert_eq!(err.severity(), Severity::Warning);
        assert_eq!(
            err.to_string(),
            "Invalid prompt: Add at least one point before segmenting"
        );
    }

    #[test]
    fn io_and_engine_errors_block() {
        let load = AppError::ImageLoad {
            path: PathBuf::from("missing.png"),
            reason: "not found".into(),
        };
        assert_eq!(load.severity(), Severity::Blocking);
        assert_eq!(load.to_string(), "Failed to load image missing.png: not found");
        assert_eq!(AppError::engine("oom").severity(), Severity::Blocking);
    }
}
