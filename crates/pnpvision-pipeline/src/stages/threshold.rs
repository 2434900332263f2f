//! Binary threshold of the working image.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::result::StageResult;
use crate::stage::{Stage, StageContext};
use crate::types::ColorSpace;
use crate::vision;

/// Convert the working image to gray and binarize it.
///
/// Pixels brighter than `threshold` become 255 and the rest 0; `invert`
/// swaps the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Threshold {
    /// Gray level separating background from foreground.
    pub threshold: u8,
    /// Mark dark pixels as foreground instead.
    pub invert: bool,
}

impl Default for Threshold {
    fn default() -> Self {
        Self {
            threshold: 128,
            invert: false,
        }
    }
}

impl Threshold {
    /// Check the options. Every value is valid.
    ///
    /// # Errors
    ///
    /// Never fails; present for uniformity with the other stages.
    #[allow(clippy::unnecessary_wraps, clippy::unused_self)]
    pub const fn validate(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

impl Stage for Threshold {
    fn kind(&self) -> &'static str {
        "Threshold"
    }

    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        let (image, _) = ctx.require_working_image()?;
        let binary = vision::threshold(&vision::to_gray(image), self.threshold, self.invert);
        Ok(Some(StageResult::image(
            DynamicImage::ImageLuma8(binary),
            ColorSpace::Gray,
        )))
    }
}
