//! Restore an earlier stage's image as the working image.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::result::StageResult;
use crate::stage::{Stage, StageContext, configured_name};

/// Make the image recorded by another stage the working image again.
///
/// Typically used after a detection chain to draw overlays on the
/// original frame. The referenced stage is a hard dependency; a blank
/// name makes this stage a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRecall {
    /// Stage whose image is recalled.
    pub image_stage_name: Option<String>,
}

impl ImageRecall {
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

impl Stage for ImageRecall {
    fn kind(&self) -> &'static str {
        "ImageRecall"
    }

    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        let Some(name) = configured_name(self.image_stage_name.as_deref()) else {
            return Ok(None);
        };
        let recalled = ctx.expected_result(name)?;
        match (recalled.image_ref(), recalled.color_space()) {
            (Some(image), Some(color_space)) => {
                Ok(Some(StageResult::image(image.clone(), color_space)))
            }
            _ => Err(PipelineError::InvalidConfig(format!(
                "stage '{name}' recorded no image to recall"
            ))),
        }
    }
}
