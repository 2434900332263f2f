//! Load (or synthesize) the template image for the part being handled.
//!
//! The template is found in this order:
//!
//! 1. `template_file` ending in `extension` names the image directly.
//! 2. Otherwise `template_file` is a directory (default:
//!    `<configuration directory>/templates`) searched for
//!    `<prefix><part id><extension>`, then `<prefix><package id><extension>`.
//!    The part comes from the `part` property, else from the `feeder`
//!    property's loaded part.
//! 3. Failing both, a white rectangle the size of the package body is
//!    synthesized, in pixels of the `camera` property's scale, in portrait
//!    orientation.
//!
//! Missing context (no part, no footprint, no camera, zero body size, no
//! file) yields no result rather than a failure. A file that exists but
//! cannot be decoded is a failure.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::context::{Camera, Feeder, Footprint, Part};
use crate::error::PipelineError;
use crate::properties;
use crate::result::StageResult;
use crate::stage::{Stage, StageContext};
use crate::types::{ColorSpace, Model, Point, RotatedRect, Size};
use crate::vision;

const DEFAULT_EXTENSION: &str = ".png";
const TEMPLATE_DIRECTORY: &str = "templates";

/// Read the template image for the current part.
///
/// On success the result carries the image and a [`RotatedRect`] model
/// centered in it, sized to it, at angle 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadPartTemplateImage {
    /// Template image, or directory searched by part and package id.
    pub template_file: Option<PathBuf>,
    /// File extension, including the dot. Blank means `.png`.
    pub extension: String,
    /// Prefix of inferred file names (e.g. to separate up and down
    /// looking templates).
    pub prefix: String,
    /// Report the resolution steps at `info` level instead of `debug`.
    pub log: bool,
    /// Color space the template was written in.
    ///
    /// Only the tag changes; pixel values are never converted. The tag is
    /// applied when it matches the file's channel layout (HSV counts as
    /// three channels); otherwise the file keeps the tag of its own layout.
    pub color_space: ColorSpace,
}

impl Default for ReadPartTemplateImage {
    fn default() -> Self {
        Self {
            template_file: None,
            extension: DEFAULT_EXTENSION.to_string(),
            prefix: String::new(),
            log: false,
            color_space: ColorSpace::Rgb,
        }
    }
}

impl ReadPartTemplateImage {
    /// Check the options. Every value is valid; a blank extension is
    /// treated as `.png`.
    ///
    /// # Errors
    ///
    /// Never fails; present for uniformity with the other stages.
    #[allow(clippy::unnecessary_wraps, clippy::unused_self)]
    pub const fn validate(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    fn extension(&self) -> &str {
        let ext = self.extension.trim();
        if ext.is_empty() { DEFAULT_EXTENSION } else { ext }
    }

    fn note(&self, stage: &str, message: &str) {
        if self.log {
            tracing::info!(stage, "{message}");
        } else {
            tracing::debug!(stage, "{message}");
        }
    }

    /// The configured path, or the default template directory.
    fn search_path(ctx: &StageContext<'_>, configured: Option<&Path>) -> PathBuf {
        match configured.filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty()) {
            Some(path) => path.to_path_buf(),
            None => ctx
                .property::<PathBuf>(properties::CONFIGURATION_DIRECTORY)
                .map_or_else(
                    || PathBuf::from(TEMPLATE_DIRECTORY),
                    |dir| dir.join(TEMPLATE_DIRECTORY),
                ),
        }
    }

    fn load(&self, path: &Path) -> Result<Option<StageResult>, PipelineError> {
        if !path.is_file() {
            return Err(PipelineError::ResourceUnavailable(format!(
                "template image {} does not exist",
                path.display()
            )));
        }
        let (image, color_space) = tag_decoded(vision::load_image(path)?, self.color_space);
        let (width, height) = vision::dimensions(&image);
        if width == 0 || height == 0 {
            return Ok(None);
        }
        let model = centered_rect(f64::from(width), f64::from(height));
        Ok(Some(StageResult::with_model(image, color_space, model)))
    }

    fn synthesize(
        &self,
        ctx: &StageContext<'_>,
        footprint: Option<&Footprint>,
    ) -> Result<Option<StageResult>, PipelineError> {
        let Some(footprint) = footprint else {
            self.note(ctx.name(), "package has no footprint, no template available");
            return Ok(None);
        };
        if footprint.body_width == 0.0 || footprint.body_height == 0.0 {
            self.note(ctx.name(), "package body dimensions are not set");
            return Ok(None);
        }
        // Portrait orientation.
        let (width, height) = if footprint.body_width > footprint.body_height {
            (footprint.body_height, footprint.body_width)
        } else {
            (footprint.body_width, footprint.body_height)
        };
        let camera = ctx.properties().require::<Camera>(properties::CAMERA)?;
        let scale = camera.units_per_pixel.convert_to(footprint.units);
        let (Some(w), Some(h)) = (pixels(width / scale.x), pixels(height / scale.y)) else {
            self.note(ctx.name(), "package body is smaller than one pixel");
            return Ok(None);
        };
        self.note(ctx.name(), "using package body as template");
        let image = vision::solid_image(w, h, Color::WHITE);
        Ok(Some(StageResult::with_model(
            image,
            ColorSpace::Rgb,
            centered_rect(f64::from(w), f64::from(h)),
        )))
    }
}

impl Stage for ReadPartTemplateImage {
    fn kind(&self) -> &'static str {
        "ReadPartTemplateImage"
    }

    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        let ext = self.extension();
        let path = Self::search_path(ctx, self.template_file.as_deref());

        if path.to_string_lossy().ends_with(ext) {
            self.note(ctx.name(), "using user defined template image");
            return self.load(&path);
        }

        let part = ctx
            .property::<Part>(properties::PART)
            .or_else(|| {
                ctx.property::<Feeder>(properties::FEEDER)
                    .and_then(|f| f.part.as_ref())
            })
            .ok_or_else(|| {
                PipelineError::ResourceUnavailable(
                    "no feeder, part or template file to name the template".to_string(),
                )
            })?;

        let by_part = path.join(format!("{}{}{ext}", self.prefix, part.id));
        if by_part.is_file() {
            self.note(ctx.name(), "using part template image");
            return self.load(&by_part);
        }
        let by_package = path.join(format!("{}{}{ext}", self.prefix, part.package.id));
        if by_package.is_file() {
            self.note(ctx.name(), "using package template image");
            return self.load(&by_package);
        }
        self.synthesize(ctx, part.package.footprint.as_ref())
    }
}

/// Tag a decoded template without touching its values.
///
/// The image is normalized to the 8-bit form of its own layout.
fn tag_decoded(image: DynamicImage, configured: ColorSpace) -> (DynamicImage, ColorSpace) {
    let layout = vision::natural_color_space(&image);
    let tag = match (layout, configured) {
        (ColorSpace::Rgb, ColorSpace::Hsv) => ColorSpace::Hsv,
        _ => layout,
    };
    (vision::into_color_space(image, layout), tag)
}

fn centered_rect(width: f64, height: f64) -> Model {
    Model::RotatedRect(RotatedRect::new(
        Point::new(width / 2.0, height / 2.0),
        Size::new(width, height),
        0.0,
    ))
}

/// Whole pixels in `extent`, truncated; `None` below one pixel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixels(extent: f64) -> Option<u32> {
    (extent.is_finite() && extent >= 1.0).then(|| extent.min(f64::from(u32::MAX)) as u32)
}
