//! The value a stage produces for one run.

use image::DynamicImage;

use crate::error::PipelineError;
use crate::types::{ColorSpace, ListModel, Model, ModelKind, SingleModel};

/// Output of one stage for one run: an optional image (always tagged with
/// its color space) and an optional model.
///
/// Immutable once constructed. A result with neither image nor model is a
/// "no-op" signal; the pipeline records it as empty, not as a success.
#[derive(Debug, Clone, Default)]
pub struct StageResult {
    image: Option<(DynamicImage, ColorSpace)>,
    model: Option<Model>,
}

impl StageResult {
    /// A result carrying only an image.
    #[must_use]
    pub const fn image(image: DynamicImage, color_space: ColorSpace) -> Self {
        Self {
            image: Some((image, color_space)),
            model: None,
        }
    }

    /// A result carrying only a model.
    #[must_use]
    pub const fn model(model: Model) -> Self {
        Self {
            image: None,
            model: Some(model),
        }
    }

    /// A result carrying both an image and a model.
    #[must_use]
    pub const fn with_model(image: DynamicImage, color_space: ColorSpace, model: Model) -> Self {
        Self {
            image: Some((image, color_space)),
            model: Some(model),
        }
    }

    /// A result carrying nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            image: None,
            model: None,
        }
    }

    /// The produced image, if any.
    #[must_use]
    pub fn image_ref(&self) -> Option<&DynamicImage> {
        self.image.as_ref().map(|(image, _)| image)
    }

    /// Color space of the produced image. `None` exactly when there is no image.
    #[must_use]
    pub fn color_space(&self) -> Option<ColorSpace> {
        self.image.as_ref().map(|&(_, cs)| cs)
    }

    /// The produced model, if any.
    #[must_use]
    pub const fn model_ref(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// Returns `true` if neither image nor model is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.image.is_none() && self.model.is_none()
    }

    /// Split into image (with color space) and model.
    #[must_use]
    pub fn into_parts(self) -> (Option<(DynamicImage, ColorSpace)>, Option<Model>) {
        (self.image, self.model)
    }

    /// The model, which must be present.
    ///
    /// `stage` names this result's producer in the error.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingExpectedResult`] if there is no model.
    pub fn expected_model(&self, stage: &str) -> Result<&Model, PipelineError> {
        self.model
            .as_ref()
            .ok_or_else(|| PipelineError::MissingExpectedResult {
                name: stage.to_string(),
            })
    }

    /// The model as a list of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingExpectedResult`] if there is no model
    /// and [`PipelineError::ResultTypeMismatch`] if the model is not a list
    /// of `T`.
    pub fn expected_list_model<T: ListModel>(&self, stage: &str) -> Result<&[T], PipelineError> {
        let model = self.expected_model(stage)?;
        T::list(model).ok_or_else(|| mismatch(stage, T::KIND, model))
    }

    /// The model as a single `T`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingExpectedResult`] if there is no model
    /// and [`PipelineError::ResultTypeMismatch`] if the model is not a `T`.
    pub fn expected_single_model<T: SingleModel>(&self, stage: &str) -> Result<&T, PipelineError> {
        let model = self.expected_model(stage)?;
        T::single(model).ok_or_else(|| mismatch(stage, T::KIND, model))
    }
}

fn mismatch(stage: &str, expected: ModelKind, model: &Model) -> PipelineError {
    PipelineError::ResultTypeMismatch {
        stage: stage.to_string(),
        expected,
        found: model.kind(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Circle, Point, RotatedRect, Size};

    fn rect() -> RotatedRect {
        RotatedRect::new(Point::new(5.0, 5.0), Size::new(10.0, 10.0), 0.0)
    }

    #[test]
    fn empty_result_is_empty() {
        assert!(StageResult::empty().is_empty());
        assert!(StageResult::default().is_empty());
        assert!(!StageResult::model(Model::Scalar(1.0)).is_empty());
    }

    #[test]
    fn image_always_carries_color_space() {
        let result = StageResult::image(DynamicImage::new_luma8(2, 2), ColorSpace::Gray);
        assert_eq!(result.color_space(), Some(ColorSpace::Gray));
        assert!(StageResult::model(Model::Scalar(0.0)).color_space().is_none());
    }

    #[test]
    fn list_model_retrieval() {
        let circles = vec![Circle::new(1.0, 2.0, 3.0), Circle::new(4.0, 5.0, 6.0)];
        let result = StageResult::model(Model::Circles(circles.clone()));
        assert_eq!(result.expected_list_model::<Circle>("d").unwrap(), &circles[..]);
    }

    #[test]
    fn single_rect_rejected_as_circle_list() {
        let result = StageResult::model(Model::RotatedRect(rect()));
        let err = result.expected_list_model::<Circle>("d").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ResultTypeMismatch {
                expected: ModelKind::Circles,
                found: ModelKind::RotatedRect,
                ..
            }
        ));
    }

    #[test]
    fn single_rect_rejected_as_rect_list() {
        let result = StageResult::model(Model::RotatedRect(rect()));
        assert!(result.expected_list_model::<RotatedRect>("d").is_err());
        assert_eq!(result.expected_single_model::<RotatedRect>("d").unwrap(), &rect());
    }

    #[test]
    fn missing_model_is_missing_result() {
        let result = StageResult::image(DynamicImage::new_rgb8(1, 1), ColorSpace::Rgb);
        assert!(matches!(
            result.expected_model("img"),
            Err(PipelineError::MissingExpectedResult { name }) if name == "img"
        ));
    }
}
