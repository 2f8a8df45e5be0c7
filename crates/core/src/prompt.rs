//! Engine prompts derived from the current selection.

use crate::error::PromptError;
use crate::geometry::ImagePoint;
use crate::selection::Selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLabel {
    /// Foreground.
    Positive,
}

impl PointLabel {
    /// Numeric label as segmentation engines expect it (1 = foreground).
    pub fn as_engine_label(self) -> u8 {
        match self {
            Self::Positive => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabeledPoint {
    pub point: ImagePoint,
    pub label: PointLabel,
}

/// Geometric hint passed to the segmentation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// No hint; the engine picks the most salient region.
    None,
    /// Box with `min` as its top-left and `max` as its bottom-right corner.
    BoundingBox { min: ImagePoint, max: ImagePoint },
    Points(Vec<LabeledPoint>),
}

impl Prompt {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BoundingBox { .. } => "bbox",
            Self::Points(_) => "points",
        }
    }
}

/// Builds the engine prompt for `selection`.
///
/// Box corners are normalized to `(min, max)`. A missing or zero-area box and
/// an empty point list are rejected so no job is started for them.
pub fn build_prompt(selection: &Selection) -> Result<Prompt, PromptError> {
    match selection {
        Selection::All => Ok(Prompt::None),
        Selection::BoundingBox(None) => Err(PromptError::NoBoundingBox),
        Selection::BoundingBox(Some(rect)) => {
            let (min, max) = rect.normalized();
            let (width, height) = (max.x - min.x, max.y - min.y);
            if width == 0 || height == 0 {
                return Err(PromptError::DegenerateBoundingBox { width, height });
            }
            Ok(Prompt::BoundingBox { min, max })
        }
        Selection::Points(points) if points.is_empty() => Err(PromptError::EmptyPointSet),
        Selection::Points(points) => Ok(Prompt::Points(
            points
                .iter()
                .map(|&point| LabeledPoint {
                    point,
                    label: PointLabel::Positive,
                })
                .collect(),
        )),
    }
}
