//! Contour tracing and the measurements derived from contours.
//!
//! [`FindContours`] traces the outer borders of the foreground regions of
//! a binary working image. [`FitCircles`] and [`MinAreaRect`] turn a traced
//! contour list, referenced by stage name, into circles or rotated
//! rectangles. None of these stages changes the working image.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::result::StageResult;
use crate::stage::{Stage, StageContext, configured_name};
use crate::types::{Circle, Contour, Model, RotatedRect};
use crate::vision;

/// Trace outer contours of the working image's foreground.
///
/// The working image is read as gray; any non-zero pixel is foreground, so
/// it is normally preceded by a threshold or edge stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindContours {
    /// Contours with fewer points are dropped.
    pub min_points: usize,
}

impl Default for FindContours {
    fn default() -> Self {
        Self { min_points: 3 }
    }
}

impl FindContours {
    /// Check the options.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `min_points` is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.min_points == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_points must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Stage for FindContours {
    fn kind(&self) -> &'static str {
        "FindContours"
    }

    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        self.validate()?;
        let (image, _) = ctx.require_working_image()?;
        let contours = vision::find_outer_contours(&vision::to_gray(image), self.min_points);
        tracing::trace!(stage = ctx.name(), count = contours.len(), "contours traced");
        Ok(Some(StageResult::model(Model::Contours(contours))))
    }
}

/// Fit one circle per contour of another stage.
///
/// The center is the contour's centroid and the diameter twice the mean
/// distance from the centroid to the contour points. Circles outside the
/// configured diameter range are dropped. The contour stage is a hard
/// dependency; a blank name makes this stage a no-op.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitCircles {
    /// Stage holding a list of contours.
    pub contours_stage_name: Option<String>,
    /// Smallest diameter kept, in pixels.
    pub min_diameter: f64,
    /// Largest diameter kept, in pixels. Unbounded when unset.
    pub max_diameter: Option<f64>,
}

impl FitCircles {
    /// Check the options.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a negative or non-finite
    /// diameter bound, or a maximum below the minimum.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.min_diameter.is_finite() || self.min_diameter < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "min_diameter must be a non-negative number, got {}",
                self.min_diameter
            )));
        }
        if let Some(max) = self.max_diameter
            && (max.is_nan() || max < self.min_diameter)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "max_diameter ({max}) is below min_diameter ({})",
                self.min_diameter
            )));
        }
        Ok(())
    }

    fn keeps(&self, diameter: f64) -> bool {
        diameter >= self.min_diameter && self.max_diameter.is_none_or(|max| diameter <= max)
    }
}

/// Centroid and mean-radius circle through a contour.
fn fit_circle(contour: &Contour) -> Option<Circle> {
    let center = contour.centroid()?;
    #[allow(clippy::cast_precision_loss)]
    let radius = contour
        .points()
        .iter()
        .map(|p| p.distance(center))
        .sum::<f64>()
        / contour.len() as f64;
    Some(Circle::new(center.x, center.y, radius * 2.0))
}

impl Stage for FitCircles {
    fn kind(&self) -> &'static str {
        "FitCircles"
    }

    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        self.validate()?;
        let Some(name) = configured_name(self.contours_stage_name.as_deref()) else {
            return Ok(None);
        };
        let contours = ctx.expected_list_model::<Contour>(name)?;
        let circles: Vec<Circle> = contours
            .iter()
            .filter_map(fit_circle)
            .filter(|c| self.keeps(c.diameter))
            .collect();
        Ok(Some(StageResult::model(Model::Circles(circles))))
    }
}

/// Minimum-area rotated rectangles.
///
/// With `contours_stage_name` set, one rectangle is fitted per contour of
/// that stage (a list model). Without it, a single rectangle is fitted
/// around every foreground pixel of the working image; an image with fewer
/// than three foreground pixels yields no result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MinAreaRect {
    /// Stage holding a list of contours.
    pub contours_stage_name: Option<String>,
}

impl MinAreaRect {
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

impl Stage for MinAreaRect {
    fn kind(&self) -> &'static str {
        "MinAreaRect"
    }

    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
        if let Some(name) = configured_name(self.contours_stage_name.as_deref()) {
            let rects: Vec<RotatedRect> = ctx
                .expected_list_model::<Contour>(name)?
                .iter()
                .filter_map(|c| vision::min_area_rect(c.points()))
                .collect();
            return Ok(Some(StageResult::model(Model::RotatedRects(rects))));
        }
        let (image, _) = ctx.require_working_image()?;
        let points = vision::foreground_points(&vision::to_gray(image));
        Ok(vision::min_area_rect(&points).map(|rect| StageResult::model(Model::RotatedRect(rect))))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{DynamicImage, GrayImage};

    use super::*;
    use crate::pipeline::Pipeline;
    use crate::stages::testing::run_one;
    use crate::types::{ColorSpace, ModelKind};

    /// Two filled white squares on black: 6x6 at (2,2) and 10x10 at (20,4).
    fn two_squares() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(40, 20, |x, y| {
            let small = (2..8).contains(&x) && (2..8).contains(&y);
            let large = (20..30).contains(&x) && (4..14).contains(&y);
            image::Luma([if small || large { 255 } else { 0 }])
        }))
    }

    fn detection(fit: FitCircles) -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline
            .add_stage("contours", FindContours::default())
            .unwrap()
            .add_stage("circles", fit)
            .unwrap()
            .add_stage(
                "rects",
                MinAreaRect {
                    contours_stage_name: Some("contours".to_string()),
                },
            )
            .unwrap();
        pipeline.set_input_image(two_squares(), ColorSpace::Gray);
        pipeline.run();
        pipeline
    }

    fn fit_from_contours() -> FitCircles {
        FitCircles {
            contours_stage_name: Some("contours".to_string()),
            ..FitCircles::default()
        }
    }

    #[test]
    fn finds_one_contour_per_blob() {
        let pipeline = run_one(FindContours::default(), Some((two_squares(), ColorSpace::Gray)));
        let contours = pipeline.expected_list_model::<Contour>("stage").unwrap();
        assert_eq!(contours.len(), 2);
        // The working image is untouched.
        assert_eq!(pipeline.working_image().unwrap().0, &two_squares());
    }

    #[test]
    fn circles_sit_on_the_squares() {
        let pipeline = detection(fit_from_contours());
        let mut circles = pipeline.expected_list_model::<Circle>("circles").unwrap().to_vec();
        circles.sort_by(|a, b| a.x.total_cmp(&b.x));
        assert_eq!(circles.len(), 2);
        assert!((circles[0].x - 4.5).abs() < 1.0);
        assert!((circles[1].y - 8.5).abs() < 1.0);
        assert!(circles[1].diameter > circles[0].diameter);
    }

    #[test]
    fn diameter_bounds_filter_circles() {
        let pipeline = detection(FitCircles {
            min_diameter: 8.0,
            ..fit_from_contours()
        });
        let circles = pipeline.expected_list_model::<Circle>("circles").unwrap();
        assert_eq!(circles.len(), 1);
    }

    #[test]
    fn rects_per_contour_form_a_list() {
        let pipeline = detection(fit_from_contours());
        let model = pipeline.expected_model("rects").unwrap();
        assert_eq!(model.kind(), ModelKind::RotatedRects);
        assert_eq!(
            pipeline.expected_list_model::<RotatedRect>("rects").unwrap().len(),
            2
        );
    }

    #[test]
    fn rect_around_all_foreground_is_single() {
        let pipeline = run_one(MinAreaRect::default(), Some((two_squares(), ColorSpace::Gray)));
        let rect = pipeline.expected_single_model::<RotatedRect>("stage").unwrap();
        assert!(rect.size.width * rect.size.height > 100.0);
        // A single rect is not a list.
        assert!(matches!(
            pipeline.expected_list_model::<RotatedRect>("stage"),
            Err(PipelineError::ResultTypeMismatch { .. })
        ));
    }

    #[test]
    fn blank_image_has_no_rect() {
        let blank = DynamicImage::new_luma8(8, 8);
        let pipeline = run_one(MinAreaRect::default(), Some((blank, ColorSpace::Gray)));
        assert!(pipeline.result("stage").unwrap().is_none());
        assert!(pipeline.report().succeeded());
    }

    #[test]
    fn fit_circles_without_a_source_is_a_no_op() {
        let pipeline = run_one(FitCircles::default(), Some((two_squares(), ColorSpace::Gray)));
        assert!(pipeline.result("stage").unwrap().is_none());
    }

    #[test]
    fn inverted_diameter_bounds_are_rejected() {
        let fit = FitCircles {
            min_diameter: 10.0,
            max_diameter: Some(5.0),
            ..FitCircles::default()
        };
        assert!(fit.validate().is_err());
    }
}
