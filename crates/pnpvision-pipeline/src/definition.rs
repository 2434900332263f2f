//! Serializable pipeline definitions.
//!
//! A definition lists stages in order, each with a unique name, an
//! `enabled` flag and its kind-specific options:
//!
//! ```json
//! {
//!   "stages": [
//!     { "name": "threshold", "kind": "Threshold", "threshold": 100 },
//!     { "name": "contours", "kind": "FindContours" },
//!     { "name": "circles", "kind": "FitCircles", "contours_stage_name": "contours" },
//!     { "name": "draw", "kind": "DrawCircles", "circles_stage_name": "circles", "enabled": false }
//!   ]
//! }
//! ```
//!
//! Omitted options take their defaults. The storage format is the caller's
//! choice; anything `serde` can read works.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::stage::Stage;
use crate::stages::{
    BlurGaussian, ConvertColor, DetectEdgesCanny, DrawCircles, DrawRotatedRects, FindContours,
    FitCircles, ImageRead, ImageRecall, MinAreaRect, ReadPartTemplateImage, Threshold,
};

/// A built-in stage and its options, tagged by `"kind"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StageKind {
    /// See [`ImageRead`].
    ImageRead(ImageRead),
    /// See [`ImageRecall`].
    ImageRecall(ImageRecall),
    /// See [`ConvertColor`].
    ConvertColor(ConvertColor),
    /// See [`BlurGaussian`].
    BlurGaussian(BlurGaussian),
    /// See [`Threshold`].
    Threshold(Threshold),
    /// See [`DetectEdgesCanny`].
    DetectEdgesCanny(DetectEdgesCanny),
    /// See [`FindContours`].
    FindContours(FindContours),
    /// See [`FitCircles`].
    FitCircles(FitCircles),
    /// See [`MinAreaRect`].
    MinAreaRect(MinAreaRect),
    /// See [`DrawCircles`].
    DrawCircles(DrawCircles),
    /// See [`DrawRotatedRects`].
    DrawRotatedRects(DrawRotatedRects),
    /// See [`ReadPartTemplateImage`].
    ReadPartTemplateImage(ReadPartTemplateImage),
}

impl StageKind {
    /// Check the stage's options.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// malformed option.
    pub fn validate(&self) -> Result<(), PipelineError> {
        match self {
            Self::ImageRead(s) => s.validate(),
            Self::ImageRecall(s) => s.validate(),
            Self::ConvertColor(s) => s.validate(),
            Self::BlurGaussian(s) => s.validate(),
            Self::Threshold(s) => s.validate(),
            Self::DetectEdgesCanny(s) => s.validate(),
            Self::FindContours(s) => s.validate(),
            Self::FitCircles(s) => s.validate(),
            Self::MinAreaRect(s) => s.validate(),
            Self::DrawCircles(s) => s.validate(),
            Self::DrawRotatedRects(s) => s.validate(),
            Self::ReadPartTemplateImage(s) => s.validate(),
        }
    }

    /// Box the options as a runnable stage.
    ///
    /// The boxed value is the options struct itself, so
    /// [`Pipeline::stage_mut`](crate::Pipeline::stage_mut) can reach it by
    /// its concrete type.
    #[must_use]
    pub fn into_stage(self) -> Box<dyn Stage> {
        match self {
            Self::ImageRead(s) => Box::new(s),
            Self::ImageRecall(s) => Box::new(s),
            Self::ConvertColor(s) => Box::new(s),
            Self::BlurGaussian(s) => Box::new(s),
            Self::Threshold(s) => Box::new(s),
            Self::DetectEdgesCanny(s) => Box::new(s),
            Self::FindContours(s) => Box::new(s),
            Self::FitCircles(s) => Box::new(s),
            Self::MinAreaRect(s) => Box::new(s),
            Self::DrawCircles(s) => Box::new(s),
            Self::DrawRotatedRects(s) => Box::new(s),
            Self::ReadPartTemplateImage(s) => Box::new(s),
        }
    }
}

/// One named stage of a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Unique stage name.
    pub name: String,
    /// Whether the stage runs. Defaults to `true`.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// The stage kind and its options.
    #[serde(flatten)]
    pub kind: StageKind,
}

const fn enabled_by_default() -> bool {
    true
}

impl StageDefinition {
    /// An enabled stage.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            kind,
        }
    }
}

/// An ordered list of stage definitions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Stages in execution order.
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
}
