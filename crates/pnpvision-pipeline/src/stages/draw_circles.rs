//! Overlay circles found by another stage on the working image.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::PipelineError;
use crate::result::StageResult;
use crate::stage::{Stage, StageContext, configured_name};
use crate::types::Circle;
use crate::vision;

use super::{drawable_copy, validate_thickness};

/// Draw every circle of another stage's list model.
///
/// - A blank `circles_stage_name` makes the stage a no-op.
/// - The referenced stage must have produced a result this run; if that
///   result has no model, nothing is drawn.
/// - The model must be a list of circles.
///
/// Circle `i` is drawn in `color`, or in [`Color::indexed`]`(i)` when no
/// color is set, with a small center marker in `center_color` (default:
/// the complement of the circle's color). The drawn copy of the working
/// image is returned as this stage's image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawCircles {
    /// Stage holding the circles.
    pub circles_stage_name: Option<String>,
    /// Outline color for every circle.
    pub color: Option<Color>,
    /// Center marker color for every circle.
    pub center_color: Option<Color>,
    /// Outline width in pixels; negative fills.
    pub thickness: i32,
}

impl Default for DrawCircles {
    fn default() -> Self {
        Self {
            circles_stage_name: None,
            color: None,
            center_color: None,
            thickness: 1,
        }
    }
}

impl DrawCircles {
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

impl Stage for DrawCircles {
    fn kind(&self) -> &'static str {
        "DrawCircles"
    }

    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        self.validate()?;
        let Some(name) = configured_name(self.circles_stage_name.as_deref()) else {
            return Ok(None);
        };
        let source = ctx.expected_result(name)?;
        if source.model_ref().is_none() {
            return Ok(None);
        }
        let circles = source.expected_list_model::<Circle>(name)?;

        let (working, color_space) = ctx.require_working_image()?;
        let (mut canvas, color_space) = drawable_copy(working, color_space);
        for (i, circle) in circles.iter().enumerate() {
            let color = self.color.unwrap_or_else(|| Color::indexed(i));
            let center_color = self.center_color.unwrap_or_else(|| color.complementary());
            vision::draw_circle(
                &mut canvas,
                circle.center(),
                circle.diameter / 2.0,
                color,
                self.thickness,
            )?;
            vision::draw_circle(&mut canvas, circle.center(), 1.0, center_color, 2)?;
        }
        Ok(Some(StageResult::image(canvas, color_space)))
    }
}
