//! Built-in stages.
//!
//! Every stage is a plain options struct implementing [`Stage`](crate::Stage).
//! Options deserialize with `#[serde(default)]`, so a definition only needs
//! to name the options it changes, and each struct's `validate` method is
//! applied both when a pipeline is built from a definition and at the start
//! of every `process` call.
//!
//! Image-producing stages, drawing stages included, always return their
//! image explicitly. None of them mutates the working image in place.

mod blur;
mod canny;
mod contours;
mod convert_color;
mod draw_circles;
mod draw_rotated_rects;
mod image_read;
mod image_recall;
mod read_part_template_image;
mod threshold;

pub use blur::BlurGaussian;
pub use canny::DetectEdgesCanny;
pub use contours::{FindContours, FitCircles, MinAreaRect};
pub use convert_color::{ColorConversion, ConvertColor};
pub use draw_circles::DrawCircles;
pub use draw_rotated_rects::DrawRotatedRects;
pub use image_read::ImageRead;
pub use image_recall::ImageRecall;
pub use read_part_template_image::ReadPartTemplateImage;
pub use threshold::Threshold;

use image::DynamicImage;

use crate::error::PipelineError;
use crate::types::ColorSpace;
use crate::vision;

/// Widest outline a drawing stage accepts, in pixels.
pub const MAX_THICKNESS: i32 = 1024;

/// Reject a drawing thickness of zero or wider than [`MAX_THICKNESS`].
///
/// Positive values are outline widths in pixels; negative values fill.
fn validate_thickness(thickness: i32) -> Result<(), PipelineError> {
    if thickness == 0 {
        return Err(PipelineError::InvalidConfig(
            "thickness must be non-zero (negative fills)".to_string(),
        ));
    }
    if thickness > MAX_THICKNESS {
        return Err(PipelineError::InvalidConfig(format!(
            "thickness must be at most {MAX_THICKNESS}, got {thickness}"
        )));
    }
    Ok(())
}

/// Clone the working image into a layout that can show colored overlays.
///
/// Grayscale images are promoted to RGB; other layouts are kept.
fn drawable_copy(image: &DynamicImage, color_space: ColorSpace) -> (DynamicImage, ColorSpace) {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) => (
            DynamicImage::ImageRgb8(vision::to_rgb(image)),
            ColorSpace::Rgb,
        ),
        other => (other.clone(), color_space),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    use image::DynamicImage;

    use crate::pipeline::Pipeline;
    use crate::stage::Stage;
    use crate::types::ColorSpace;

    /// Run `stage` alone, named `"stage"`, on the given input.
    pub fn run_one(stage: impl Stage, input: Option<(DynamicImage, ColorSpace)>) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline.add_stage("stage", stage).unwrap();
        if let Some((image, color_space)) = input {
            pipeline.set_input_image(image, color_space);
        }
        pipeline.run();
        pipeline
    }
}
