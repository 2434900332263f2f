//! Overlay rotated rectangles found by another stage on the working image.

use std::slice;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::PipelineError;
use crate::result::StageResult;
use crate::stage::{Stage, StageContext, configured_name};
use crate::types::{Model, ModelKind};
use crate::vision;

use super::{drawable_copy, validate_thickness};

/// Draw the rotated rectangle(s) of another stage.
///
/// Follows the same reference policy as
/// [`DrawCircles`](super::DrawCircles): blank name → no-op, referenced
/// result required, missing model → no-op. Both a single
/// [`RotatedRect`](crate::types::RotatedRect) and a list are accepted;
/// any other model is a type mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawRotatedRects {
    /// Stage holding the rectangle(s).
    pub rotated_rects_stage_name: Option<String>,
    /// Outline color for every rectangle; indexed colors when unset.
    pub color: Option<Color>,
    /// Outline width in pixels; negative fills.
    pub thickness: i32,
}

impl Default for DrawRotatedRects {
    fn default() -> Self {
        Self {
            rotated_rects_stage_name: None,
            color: None,
            thickness: 1,
        }
    }
}

impl DrawRotatedRects {
    /// Check the options.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a zero thickness or one
    /// above [`MAX_THICKNESS`](super::MAX_THICKNESS).
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_thickness(self.thickness)
    }
}

impl Stage for DrawRotatedRects {
    fn kind(&self) -> &'static str {
        "DrawRotatedRects"
    }

    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        self.validate()?;
        let Some(name) = configured_name(self.rotated_rects_stage_name.as_deref()) else {
            return Ok(None);
        };
        let Some(model) = ctx.expected_result(name)?.model_ref() else {
            return Ok(None);
        };
        let rects = match model {
            Model::RotatedRect(rect) => slice::from_ref(rect),
            Model::RotatedRects(rects) => rects.as_slice(),
            other => {
                return Err(PipelineError::ResultTypeMismatch {
                    stage: name.to_string(),
                    expected: ModelKind::RotatedRects,
                    found: other.kind(),
                });
            }
        };

        let (working, color_space) = ctx.require_working_image()?;
        let (mut canvas, color_space) = drawable_copy(working, color_space);
        for (i, rect) in rects.iter().enumerate() {
            let color = self.color.unwrap_or_else(|| Color::indexed(i));
            vision::draw_rotated_rect(&mut canvas, rect, color, self.thickness)?;
        }
        Ok(Some(StageResult::image(canvas, color_space)))
    }
}
