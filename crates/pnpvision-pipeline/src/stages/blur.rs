//! Gaussian blur for noise reduction before thresholding or edge detection.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::result::StageResult;
use crate::stage::{Stage, StageContext};
use crate::vision;

/// Smooth the working image, keeping its channel layout and color space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurGaussian {
    /// Standard deviation of the Gaussian kernel, in pixels.
    ///
    /// Zero or negative values pass the image through unchanged.
    pub sigma: f32,
}

impl Default for BlurGaussian {
    fn default() -> Self {
        Self { sigma: 1.4 }
    }
}

impl BlurGaussian {
    /// Check the options.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `sigma` is not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.sigma.is_finite() {
            return Err(PipelineError::InvalidConfig(format!(
                "sigma must be finite, got {}",
                self.sigma
            )));
        }
        Ok(())
    }
}

impl Stage for BlurGaussian {
    fn kind(&self) -> &'static str {
        "BlurGaussian"
    }

    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        self.validate()?;
        let (image, color_space) = ctx.require_working_image()?;
        Ok(Some(StageResult::image(
            vision::gaussian_blur(image, self.sigma),
            color_space,
        )))
    }
}
