//! Load the working image from a file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::result::StageResult;
use crate::stage::{Stage, StageContext};
use crate::types::ColorSpace;
use crate::vision;

/// Replace the working image with an image read from disk.
///
/// The decoded pixels are re-encoded into `color_space`. Decoding
/// failures are stage failures.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageRead {
    /// Image file to load (PNG, JPEG, BMP or WebP).
    pub file: PathBuf,
    /// Color space of the produced image.
    pub color_space: ColorSpace,
}

impl ImageRead {
    /// Check the options.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if no file is set.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.file.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "ImageRead needs a file".to_string(),
            ));
        }
        Ok(())
    }
}

impl Stage for ImageRead {
    fn kind(&self) -> &'static str {
        "ImageRead"
    }

    fn process(&self, _ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        self.validate()?;
        let image = vision::load_image(&self.file)?;
        Ok(Some(StageResult::image(
            vision::into_color_space(image, self.color_space),
            self.color_space,
        )))
    }
}
