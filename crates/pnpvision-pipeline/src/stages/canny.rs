//! Canny edge detection.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::result::StageResult;
use crate::stage::{Stage, StageContext};
use crate::types::ColorSpace;
use crate::vision;

/// Replace the working image with its binary edge map.
///
/// Both thresholds are clamped to at least
/// [`MIN_CANNY_THRESHOLD`](crate::vision::MIN_CANNY_THRESHOLD) at run time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectEdgesCanny {
    /// Gradient magnitude below which a pixel is never an edge.
    pub low: f32,
    /// Gradient magnitude above which a pixel is always an edge.
    pub high: f32,
}

impl Default for DetectEdgesCanny {
    fn default() -> Self {
        Self {
            low: 50.0,
            high: 150.0,
        }
    }
}

impl DetectEdgesCanny {
    /// Check the options.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if a threshold is negative
    /// or not finite, or if `low` exceeds `high`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (label, value) in [("low", self.low), ("high", self.high)] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "canny {label} threshold must be a non-negative number, got {value}"
                )));
            }
        }
        if self.low > self.high {
            return Err(PipelineError::InvalidConfig(format!(
                "canny low threshold ({}) exceeds high threshold ({})",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

impl Stage for DetectEdgesCanny {
    fn kind(&self) -> &'static str {
        "DetectEdgesCanny"
    }

    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        self.validate()?;
        let (image, _) = ctx.require_working_image()?;
        let edges = vision::canny(&vision::to_gray(image), self.low, self.high);
        Ok(Some(StageResult::image(
            DynamicImage::ImageLuma8(edges),
            ColorSpace::Gray,
        )))
    }
}
