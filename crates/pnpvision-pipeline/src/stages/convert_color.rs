//! Color-space conversion of the working image.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::result::StageResult;
use crate::stage::{Stage, StageContext};
use crate::types::ColorSpace;
use crate::vision;

/// A supported color-space conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorConversion {
    /// Color to single-channel luminance.
    #[default]
    RgbToGray,
    /// Luminance to three equal color channels.
    GrayToRgb,
    /// Color to hue/saturation/value.
    RgbToHsv,
    /// Hue/saturation/value back to color.
    HsvToRgb,
}

impl ColorConversion {
    /// Whether a working image tagged `from` can be converted.
    #[must_use]
    pub const fn accepts(self, from: ColorSpace) -> bool {
        matches!(
            (self, from),
            (
                Self::RgbToGray,
                ColorSpace::Rgb | ColorSpace::Rgba | ColorSpace::Gray
            ) | (Self::GrayToRgb, ColorSpace::Gray)
                | (Self::RgbToHsv, ColorSpace::Rgb | ColorSpace::Rgba)
                | (Self::HsvToRgb, ColorSpace::Hsv)
        )
    }

    /// The color space of the converted image.
    #[must_use]
    pub const fn target(self) -> ColorSpace {
        match self {
            Self::RgbToGray => ColorSpace::Gray,
            Self::GrayToRgb | Self::HsvToRgb => ColorSpace::Rgb,
            Self::RgbToHsv => ColorSpace::Hsv,
        }
    }
}

/// Convert the working image between color spaces.
///
/// The working image's color-space tag must match the conversion's source
/// (e.g. `HsvToRgb` needs an image tagged [`ColorSpace::Hsv`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertColor {
    /// The conversion to apply.
    pub conversion: ColorConversion,
}

impl ConvertColor {
    /// Check the options. Every conversion is valid.
    ///
    /// # Errors
    ///
    /// Never fails; present for uniformity with the other stages.
    #[allow(clippy::unnecessary_wraps, clippy::unused_self)]
    pub const fn validate(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}

impl Stage for ConvertColor {
    fn kind(&self) -> &'static str {
        "ConvertColor"
    }

    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        let (image, from) = ctx.require_working_image()?;
        if !self.conversion.accepts(from) {
            return Err(PipelineError::UnsupportedImage(format!(
                "{:?} cannot convert an image tagged {from}",
                self.conversion
            )));
        }
        let converted = match self.conversion {
            ColorConversion::RgbToGray => DynamicImage::ImageLuma8(vision::to_gray(image)),
            ColorConversion::GrayToRgb => DynamicImage::ImageRgb8(vision::to_rgb(image)),
            ColorConversion::RgbToHsv => {
                DynamicImage::ImageRgb8(vision::rgb_to_hsv(&vision::to_rgb(image)))
            }
            ColorConversion::HsvToRgb => {
                DynamicImage::ImageRgb8(vision::hsv_to_rgb(&vision::to_rgb(image)))
            }
        };
        Ok(Some(StageResult::image(
            converted,
            self.conversion.target(),
        )))
    }
}
