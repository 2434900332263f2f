//! Drawing colors, including the deterministic per-index palette used
//! when a drawing stage has no explicit color configured.

use serde::{Deserialize, Serialize};

/// Hue step between consecutive indexed colors, in degrees.
///
/// The golden angle keeps neighbouring indices far apart on the hue wheel
/// for any list length.
const GOLDEN_ANGLE_DEGREES: f64 = 137.507_764_050_037_9;

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (255 = opaque).
    #[serde(default = "opaque")]
    pub a: u8,
}

const fn opaque() -> u8 {
    255
}

impl Color {
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Create an opaque color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// The palette color for list element `index`.
    ///
    /// Deterministic: the same index always yields the same color.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn indexed(index: usize) -> Self {
        let hue = (index as f64 * GOLDEN_ANGLE_DEGREES) % 360.0;
        Self::from_hsl(hue, 1.0, 0.5)
    }

    /// The color on the opposite side of the hue wheel, same saturation
    /// and lightness.
    #[must_use]
    pub fn complementary(self) -> Self {
        let (h, s, l) = self.to_hsl();
        let mut c = Self::from_hsl((h + 180.0) % 360.0, s, l);
        c.a = self.a;
        c
    }

    /// Convert to an `image` pixel.
    #[must_use]
    pub const fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }

    /// Build from hue (degrees), saturation and lightness (0..=1).
    #[must_use]
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let c = (1.0 - 2.0f64.mul_add(lightness, -1.0).abs()) * saturation;
        let h = hue.rem_euclid(360.0) / 60.0;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h {
            h if h < 1.0 => (c, x, 0.0),
            h if h < 2.0 => (x, c, 0.0),
            h if h < 3.0 => (0.0, c, x),
            h if h < 4.0 => (0.0, x, c),
            h if h < 5.0 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = lightness - c / 2.0;
        Self::rgb(channel(r + m), channel(g + m), channel(b + m))
    }

    /// Hue (degrees), saturation and lightness (0..=1).
    #[must_use]
    pub fn to_hsl(self) -> (f64, f64, f64) {
        let r = f64::from(self.r) / 255.0;
        let g = f64::from(self.g) / 255.0;
        let b = f64::from(self.b) / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = f64::midpoint(max, min);
        let d = max - min;
        if d == 0.0 {
            return (0.0, 0.0, l);
        }
        let s = d / (1.0 - 2.0f64.mul_add(l, -1.0).abs());
        let h = if (max - r).abs() < f64::EPSILON {
            60.0 * ((g - b) / d).rem_euclid(6.0)
        } else if (max - g).abs() < f64::EPSILON {
            60.0 * ((b - r) / d + 2.0)
        } else {
            60.0 * ((r - g) / d + 4.0)
        };
        (h, s, l)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}
