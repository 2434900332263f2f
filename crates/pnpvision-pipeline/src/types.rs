//! Shared geometry and model types for the vision pipeline.
//!
//! Stages exchange structured measurements through [`Model`], a tagged
//! variant whose [`ModelKind`] acts as the logical type id. Typed retrieval
//! goes through the [`ListModel`] and [`SingleModel`] traits so a caller
//! asking for circles never silently receives a rectangle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `DynamicImage` so downstream crates can hold working images
/// without depending on `image` directly.
pub use image::DynamicImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.hypot(dy)
    }
}

/// Width and height of a rectangle, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Extent along the rectangle's own x axis.
    pub width: f64,
    /// Extent along the rectangle's own y axis.
    pub height: f64,
}

impl Size {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A detected circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Center x.
    pub x: f64,
    /// Center y.
    pub y: f64,
    /// Diameter in pixels.
    pub diameter: f64,
}

impl Circle {
    /// Create a new circle.
    #[must_use]
    pub const fn new(x: f64, y: f64, diameter: f64) -> Self {
        Self { x, y, diameter }
    }

    /// The circle's center point.
    #[must_use]
    pub const fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A rectangle rotated about its center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatedRect {
    /// Center of the rectangle.
    pub center: Point,
    /// Unrotated extent.
    pub size: Size,
    /// Rotation in degrees, clockwise in image coordinates.
    pub angle: f64,
}

impl RotatedRect {
    /// Create a new rotated rectangle.
    #[must_use]
    pub const fn new(center: Point, size: Size, angle: f64) -> Self {
        Self {
            center,
            size,
            angle,
        }
    }

    /// The four corners, starting top-left of the unrotated rectangle and
    /// proceeding clockwise.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let hw = self.size.width / 2.0;
        let hh = self.size.height / 2.0;
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(dx, dy)| {
            Point::new(
                self.center.x + dx.mul_add(cos, -(dy * sin)),
                self.center.y + dx.mul_add(sin, dy * cos),
            )
        })
    }
}

/// A closed contour traced from a binary image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a contour from its boundary points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Returns the number of points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Mean of the boundary points, or `None` for an empty contour.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self) -> Option<Point> {
        if self.0.is_empty() {
            return None;
        }
        let n = self.0.len() as f64;
        let (sx, sy) = self
            .0
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }
}

/// How the channels of an image should be interpreted.
///
/// This is a tag only; it never changes pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    /// Single luminance channel.
    Gray,
    /// Red, green, blue.
    #[default]
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
    /// Hue, saturation, value packed into three 8-bit channels.
    Hsv,
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gray => "Gray",
            Self::Rgb => "Rgb",
            Self::Rgba => "Rgba",
            Self::Hsv => "Hsv",
        };
        f.write_str(name)
    }
}

/// Logical type id of a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// A list of [`Circle`]s.
    Circles,
    /// A single [`RotatedRect`].
    RotatedRect,
    /// A list of [`RotatedRect`]s.
    RotatedRects,
    /// A list of [`Contour`]s.
    Contours,
    /// A single scalar value.
    Scalar,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Circles => "list of circles",
            Self::RotatedRect => "rotated rect",
            Self::RotatedRects => "list of rotated rects",
            Self::Contours => "list of contours",
            Self::Scalar => "scalar",
        };
        f.write_str(name)
    }
}

/// Structured measurement produced by a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Model {
    /// Detected circles, in detection order.
    Circles(Vec<Circle>),
    /// A single rotated rectangle.
    RotatedRect(RotatedRect),
    /// Several rotated rectangles.
    RotatedRects(Vec<RotatedRect>),
    /// Traced contours.
    Contours(Vec<Contour>),
    /// A single number.
    Scalar(f64),
}

impl Model {
    /// The logical type id of this model.
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::Circles(_) => ModelKind::Circles,
            Self::RotatedRect(_) => ModelKind::RotatedRect,
            Self::RotatedRects(_) => ModelKind::RotatedRects,
            Self::Contours(_) => ModelKind::Contours,
            Self::Scalar(_) => ModelKind::Scalar,
        }
    }
}

/// Element types that can be retrieved as a list from a [`Model`].
pub trait ListModel: Sized {
    /// The model kind a list of `Self` is stored as.
    const KIND: ModelKind;

    /// Borrow the list if `model` holds elements of this type.
    fn list(model: &Model) -> Option<&[Self]>;
}

/// Types that can be retrieved as a single value from a [`Model`].
pub trait SingleModel: Sized {
    /// The model kind `Self` is stored as.
    const KIND: ModelKind;

    /// Borrow the value if `model` holds exactly this type.
    fn single(model: &Model) -> Option<&Self>;
}

impl ListModel for Circle {
    const KIND: ModelKind = ModelKind::Circles;

    fn list(model: &Model) -> Option<&[Self]> {
        match model {
            Model::Circles(circles) => Some(circles),
            _ => None,
        }
    }
}

impl ListModel for RotatedRect {
    const KIND: ModelKind = ModelKind::RotatedRects;

    fn list(model: &Model) -> Option<&[Self]> {
        match model {
            Model::RotatedRects(rects) => Some(rects),
            _ => None,
        }
    }
}

impl ListModel for Contour {
    const KIND: ModelKind = ModelKind::Contours;

    fn list(model: &Model) -> Option<&[Self]> {
        match model {
            Model::Contours(contours) => Some(contours),
            _ => None,
        }
    }
}

impl SingleModel for RotatedRect {
    const KIND: ModelKind = ModelKind::RotatedRect;

    fn single(model: &Model) -> Option<&Self> {
        match model {
            Model::RotatedRect(rect) => Some(rect),
            _ => None,
        }
    }
}

impl SingleModel for f64 {
    const KIND: ModelKind = ModelKind::Scalar;

    fn single(model: &Model) -> Option<&Self> {
        match model {
            Model::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrotated_rect_corners() {
        let rect = RotatedRect::new(Point::new(10.0, 20.0), Size::new(4.0, 2.0), 0.0);
        let corners = rect.corners();
        assert_eq!(corners[0], Point::new(8.0, 19.0));
        assert_eq!(corners[2], Point::new(12.0, 21.0));
    }

    #[test]
    fn quarter_turn_swaps_extent() {
        let rect = RotatedRect::new(Point::new(0.0, 0.0), Size::new(4.0, 2.0), 90.0);
        let max_x = rect
            .corners()
            .iter()
            .map(|p| p.x)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!((max_x - 1.0).abs() < 1e-9, "max_x = {max_x}");
    }

    #[test]
    fn contour_centroid() {
        let contour = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ]);
        assert_eq!(contour.centroid(), Some(Point::new(1.0, 1.0)));
        assert!(Contour::new(vec![]).centroid().is_none());
    }

    #[test]
    fn model_kind_matches_variant() {
        assert_eq!(Model::Circles(vec![]).kind(), ModelKind::Circles);
        assert_eq!(Model::Scalar(1.0).kind(), ModelKind::Scalar);
        assert_eq!(
            Model::RotatedRect(RotatedRect::new(
                Point::new(0.0, 0.0),
                Size::new(1.0, 1.0),
                0.0
            ))
            .kind(),
            ModelKind::RotatedRect
        );
    }

    #[test]
    fn single_rect_is_not_a_list() {
        let rect = RotatedRect::new(Point::new(0.0, 0.0), Size::new(1.0, 1.0), 0.0);
        let model = Model::RotatedRect(rect);
        assert!(<RotatedRect as ListModel>::list(&model).is_none());
        assert_eq!(<RotatedRect as SingleModel>::single(&model), Some(&rect));
    }

    #[test]
    fn circles_list_borrows_without_copy() {
        let model = Model::Circles(vec![Circle::new(1.0, 2.0, 3.0)]);
        let circles = Circle::list(&model).map(<[Circle]>::len);
        assert_eq!(circles, Some(1));
    }

    #[test]
    fn model_kind_display() {
        assert_eq!(ModelKind::Circles.to_string(), "list of circles");
        assert_eq!(ColorSpace::Gray.to_string(), "Gray");
    }
}
