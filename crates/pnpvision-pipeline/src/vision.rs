//! Vision library adapter: the primitive image operations stages call.
//!
//! Every function here is a thin wrapper over [`image`] or [`imageproc`].
//! Stages never manipulate pixels themselves; they compose these calls.
//! All functions are pure over their arguments, so distinct pipelines may
//! call them concurrently from different threads.

use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use imageproc::contours::BorderType;

use crate::color::Color;
use crate::error::PipelineError;
use crate::types::{ColorSpace, Contour, Point, RotatedRect, Size};

/// Minimum allowed Canny threshold.
///
/// A zero low threshold marks nearly every pixel as a candidate edge.
pub const MIN_CANNY_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_CANNY_THRESHOLD > 0.0);

/// Load an image file (PNG, JPEG, BMP, WebP).
///
/// # Errors
///
/// Returns [`PipelineError::Io`] if the file cannot be read and
/// [`PipelineError::ImageDecode`] if its contents are not a supported image.
pub fn load_image(path: &Path) -> Result<DynamicImage, PipelineError> {
    let bytes = std::fs::read(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Image width and height in pixels.
#[must_use]
pub fn dimensions(image: &DynamicImage) -> (u32, u32) {
    (image.width(), image.height())
}

/// The natural color space of a decoded image's channel layout.
#[must_use]
pub fn natural_color_space(image: &DynamicImage) -> ColorSpace {
    match image.color().channel_count() {
        1 | 2 => ColorSpace::Gray,
        4 => ColorSpace::Rgba,
        _ => ColorSpace::Rgb,
    }
}

/// Convert to a single luminance channel.
#[must_use = "returns the grayscale image"]
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// Convert to three 8-bit color channels.
#[must_use = "returns the RGB image"]
pub fn to_rgb(image: &DynamicImage) -> RgbImage {
    image.to_rgb8()
}

/// Re-encode RGB pixels as HSV.
///
/// Hue is scaled to `0..=179` (two degrees per step) so it fits a byte;
/// saturation and value use the full `0..=255` range.
#[must_use = "returns the HSV-encoded image"]
pub fn rgb_to_hsv(image: &RgbImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = f64::from(max - min);
        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((f64::from(g) - f64::from(b)) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((f64::from(b) - f64::from(r)) / delta + 2.0)
        } else {
            60.0 * ((f64::from(r) - f64::from(g)) / delta + 4.0)
        };
        let sat = if max == 0 {
            0.0
        } else {
            delta / f64::from(max) * 255.0
        };
        image::Rgb([byte(hue / 2.0), byte(sat), max])
    })
}

/// Decode HSV pixels produced by [`rgb_to_hsv`] back to RGB.
#[must_use = "returns the RGB image"]
pub fn hsv_to_rgb(image: &RgbImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [h, s, v] = image.get_pixel(x, y).0;
        let hue = f64::from(h) * 2.0;
        let value = f64::from(v) / 255.0;
        let chroma = value * f64::from(s) / 255.0;
        let sector = hue / 60.0;
        let x_ = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
        let (r, g, b) = match sector {
            s if s < 1.0 => (chroma, x_, 0.0),
            s if s < 2.0 => (x_, chroma, 0.0),
            s if s < 3.0 => (0.0, chroma, x_),
            s if s < 4.0 => (0.0, x_, chroma),
            s if s < 5.0 => (x_, 0.0, chroma),
            _ => (chroma, 0.0, x_),
        };
        let m = value - chroma;
        image::Rgb([
            byte((r + m) * 255.0),
            byte((g + m) * 255.0),
            byte((b + m) * 255.0),
        ])
    })
}

/// Re-encode a decoded image into the channel layout of `target`.
///
/// The input is read as gray, RGB or RGBA according to its own layout;
/// it is never interpreted as HSV.
#[must_use = "returns the converted image"]
pub fn into_color_space(image: DynamicImage, target: ColorSpace) -> DynamicImage {
    match (target, image) {
        (ColorSpace::Gray, img @ DynamicImage::ImageLuma8(_))
        | (ColorSpace::Rgb, img @ DynamicImage::ImageRgb8(_))
        | (ColorSpace::Rgba, img @ DynamicImage::ImageRgba8(_)) => img,
        (ColorSpace::Gray, img) => DynamicImage::ImageLuma8(img.to_luma8()),
        (ColorSpace::Rgb, img) => DynamicImage::ImageRgb8(img.to_rgb8()),
        (ColorSpace::Rgba, img) => DynamicImage::ImageRgba8(img.to_rgba8()),
        (ColorSpace::Hsv, img) => DynamicImage::ImageRgb8(rgb_to_hsv(&img.to_rgb8())),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn byte(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Gaussian blur, preserving the image's channel layout.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc` panics on `sigma <= 0.0`. Color images are blurred one
/// channel at a time.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &DynamicImage, sigma: f32) -> DynamicImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    match image {
        DynamicImage::ImageLuma8(gray) => {
            DynamicImage::ImageLuma8(imageproc::filter::gaussian_blur_f32(gray, sigma))
        }
        DynamicImage::ImageRgba8(rgba) => DynamicImage::ImageRgba8(blur_rgba(rgba, sigma)),
        other => {
            let blurred = DynamicImage::ImageRgba8(blur_rgba(&other.to_rgba8(), sigma));
            DynamicImage::ImageRgb8(blurred.to_rgb8())
        }
    }
}

fn blur_rgba(image: &RgbaImage, sigma: f32) -> RgbaImage {
    let (w, h) = image.dimensions();
    let channels: [GrayImage; 4] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });
    let blurred: [GrayImage; 4] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));
    RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba(std::array::from_fn(|c| blurred[c].get_pixel(x, y).0[0]))
    })
}

/// Binary threshold: pixels above `level` become 255, others 0
/// (reversed when `invert` is set).
#[must_use = "returns the binary image"]
pub fn threshold(image: &GrayImage, level: u8, invert: bool) -> GrayImage {
    let kind = if invert {
        imageproc::contrast::ThresholdType::BinaryInverted
    } else {
        imageproc::contrast::ThresholdType::Binary
    };
    imageproc::contrast::threshold(image, level, kind)
}

/// Canny edge detection. Returns 255 for edge pixels, 0 elsewhere.
///
/// Both thresholds are clamped to at least [`MIN_CANNY_THRESHOLD`] and
/// `low` is clamped to at most `high`. An empty image has no edges.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return GrayImage::new(image.width(), image.height());
    }
    let high = high.max(MIN_CANNY_THRESHOLD);
    let low = low.max(MIN_CANNY_THRESHOLD).min(high);
    imageproc::edges::canny(image, low, high)
}

/// Outer borders of the foreground (non-zero) regions of a binary image.
///
/// Contours with fewer than `min_points` points are dropped.
#[must_use]
pub fn find_outer_contours(image: &GrayImage, min_points: usize) -> Vec<Contour> {
    imageproc::contours::find_contours::<u32>(image)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= min_points)
        .map(|c| {
            Contour::new(
                c.points
                    .into_iter()
                    .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                    .collect(),
            )
        })
        .collect()
}

/// Coordinates of every non-zero pixel.
#[must_use]
pub fn foreground_points(image: &GrayImage) -> Vec<Point> {
    image
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] > 0)
        .map(|(x, y, _)| Point::new(f64::from(x), f64::from(y)))
        .collect()
}

/// Minimum-area rectangle enclosing `points`.
///
/// Returns `None` for fewer than three points.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn min_area_rect(points: &[Point]) -> Option<RotatedRect> {
    if points.len() < 3 {
        return None;
    }
    let pixels: Vec<imageproc::point::Point<i32>> = points
        .iter()
        .map(|p| imageproc::point::Point::new(p.x.round() as i32, p.y.round() as i32))
        .collect();
    let corners = imageproc::geometry::min_area_rect(&pixels)
        .map(|c| Point::new(f64::from(c.x), f64::from(c.y)));
    let center = Point::new(
        corners.iter().map(|c| c.x).sum::<f64>() / 4.0,
        corners.iter().map(|c| c.y).sum::<f64>() / 4.0,
    );
    let width = corners[0].distance(corners[1]);
    let height = corners[1].distance(corners[2]);
    let angle = (corners[1].y - corners[0].y)
        .atan2(corners[1].x - corners[0].x)
        .to_degrees();
    Some(RotatedRect::new(center, Size::new(width, height), angle))
}

/// A solid image of the given color.
#[must_use]
pub fn solid_image(width: u32, height: u32, color: Color) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width,
        height,
        image::Rgb([color.r, color.g, color.b]),
    ))
}

/// Distance from `p` to the nearest point of a `width` x `height` frame;
/// zero inside it.
fn distance_outside(p: Point, width: f64, height: f64) -> f64 {
    p.distance(Point::new(p.x.clamp(0.0, width), p.y.clamp(0.0, height)))
}

/// Reject points that are not finite or lie farther outside the image
/// than its width plus height.
fn check_drawable(p: Point, width: f64, height: f64, what: &str) -> Result<(), PipelineError> {
    if !(p.x.is_finite() && p.y.is_finite()) {
        return Err(PipelineError::UnsupportedModel(format!(
            "{what} ({}, {}) is not finite",
            p.x, p.y
        )));
    }
    if distance_outside(p, width, height) > width + height {
        return Err(PipelineError::UnsupportedModel(format!(
            "{what} ({}, {}) lies too far outside the {width}x{height} image",
            p.x, p.y
        )));
    }
    Ok(())
}

/// Draw a circle outline `thickness` pixels wide; a negative thickness
/// fills the circle.
///
/// Only the part that can touch the image is drawn, so an oversized
/// circle costs no more than one the size of the image.
///
/// # Errors
///
/// Returns [`PipelineError::UnsupportedModel`] if the radius is negative
/// or not finite, or if the center is not finite or lies farther outside
/// the image than its width plus height.
#[allow(clippy::cast_possible_truncation)]
pub fn draw_circle(
    image: &mut DynamicImage,
    center: Point,
    radius: f64,
    color: Color,
    thickness: i32,
) -> Result<(), PipelineError> {
    if !(radius.is_finite() && radius >= 0.0) {
        return Err(PipelineError::UnsupportedModel(format!(
            "circle radius {radius} cannot be drawn"
        )));
    }
    let (width, height) = (f64::from(image.width()), f64::from(image.height()));
    check_drawable(center, width, height, "circle center")?;
    if image.width() == 0 || image.height() == 0 {
        return Ok(());
    }

    let near = distance_outside(center, width, height);
    let far = [(0.0, 0.0), (width, 0.0), (0.0, height), (width, height)]
        .into_iter()
        .map(|(x, y)| center.distance(Point::new(x, y)))
        .fold(0.0, f64::max);
    let c = (center.x.round() as i32, center.y.round() as i32);
    let pixel = color.to_rgba();

    if thickness < 0 {
        if radius > far + 1.0 {
            let all = imageproc::rect::Rect::at(0, 0).of_size(image.width(), image.height());
            imageproc::drawing::draw_filled_rect_mut(image, all, pixel);
        } else if radius + 1.0 >= near {
            imageproc::drawing::draw_filled_circle_mut(image, c, radius.round() as i32, pixel);
        }
        return Ok(());
    }

    // Rings run from `inner` outwards; those beyond `near..=far` miss the image.
    let inner = (radius.round() - f64::from((thickness - 1) / 2)).max(0.0);
    let first = inner.max((near - 1.0).floor());
    let last = (inner + f64::from(thickness - 1)).min(far.ceil() + 1.0);
    if first > last {
        return Ok(());
    }
    for ring in (first as i32)..=(last as i32) {
        imageproc::drawing::draw_hollow_circle_mut(image, c, ring, pixel);
    }
    Ok(())
}

/// Draw a rotated rectangle outline `thickness` pixels wide; a negative
/// thickness fills it.
///
/// # Errors
///
/// Returns [`PipelineError::UnsupportedModel`] if a corner is not finite
/// or lies farther outside the image than its width plus height.
#[allow(clippy::cast_possible_truncation)]
pub fn draw_rotated_rect(
    image: &mut DynamicImage,
    rect: &RotatedRect,
    color: Color,
    thickness: i32,
) -> Result<(), PipelineError> {
    let (width, height) = (f64::from(image.width()), f64::from(image.height()));
    let margin = if thickness > 0 { f64::from(thickness) } else { 0.0 };
    let outer = RotatedRect::new(
        rect.center,
        Size::new(rect.size.width + margin, rect.size.height + margin),
        rect.angle,
    );
    for corner in outer.corners() {
        check_drawable(corner, width, height, "rectangle corner")?;
    }
    if image.width() == 0 || image.height() == 0 {
        return Ok(());
    }

    if thickness < 0 {
        let poly: Vec<imageproc::point::Point<i32>> = rect
            .corners()
            .iter()
            .map(|p| imageproc::point::Point::new(p.x.round() as i32, p.y.round() as i32))
            .collect();
        // draw_polygon_mut rejects closed or degenerate polygons.
        if poly.first() != poly.last() {
            imageproc::drawing::draw_polygon_mut(image, &poly, color.to_rgba());
        }
        return Ok(());
    }
    for step in 0..thickness {
        let grow = f64::from(step - (thickness - 1) / 2) * 2.0;
        let ring = RotatedRect::new(
            rect.center,
            Size::new(rect.size.width + grow, rect.size.height + grow),
            rect.angle,
        );
        let corners = ring.corners();
        for (i, start) in corners.iter().enumerate() {
            let end = corners[(i + 1) % corners.len()];
            imageproc::drawing::draw_line_segment_mut(
                image,
                (start.x as f32, start.y as f32),
                (end.x as f32, end.y as f32),
                color.to_rgba(),
            );
        }
    }
    Ok(())
}
