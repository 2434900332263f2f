//! Run-context handles supplied by the caller through the property bag.
//!
//! These mirror the machine objects a stage may want to know about (the
//! active camera, the part being placed, the feeder it came from). They
//! are plain data: the machine layer owns the real objects and copies the
//! relevant facts in before each run.

use serde::{Deserialize, Serialize};

/// A unit of length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LengthUnit {
    /// Millimeters.
    #[default]
    Millimeters,
    /// Centimeters.
    Centimeters,
    /// Meters.
    Meters,
    /// Inches.
    Inches,
    /// Thousandths of an inch.
    Mils,
}

impl LengthUnit {
    /// Millimeters per one of this unit.
    #[must_use]
    pub const fn millimeters(self) -> f64 {
        match self {
            Self::Millimeters => 1.0,
            Self::Centimeters => 10.0,
            Self::Meters => 1000.0,
            Self::Inches => 25.4,
            Self::Mils => 0.0254,
        }
    }

    /// Convert `value` expressed in `self` into `target` units.
    #[must_use]
    pub fn convert(self, value: f64, target: Self) -> f64 {
        value * self.millimeters() / target.millimeters()
    }
}

/// Physical size of one camera pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitsPerPixel {
    /// Horizontal size of one pixel.
    pub x: f64,
    /// Vertical size of one pixel.
    pub y: f64,
    /// Unit of `x` and `y`.
    pub units: LengthUnit,
}

impl UnitsPerPixel {
    /// Re-express in `target` units.
    #[must_use]
    pub fn convert_to(self, target: LengthUnit) -> Self {
        Self {
            x: self.units.convert(self.x, target),
            y: self.units.convert(self.y, target),
            units: target,
        }
    }
}

/// The camera whose frame is being processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Camera name.
    pub name: String,
    /// Scale at the focal plane of interest.
    pub units_per_pixel: UnitsPerPixel,
}

/// Package body geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    /// Body width.
    pub body_width: f64,
    /// Body height.
    pub body_height: f64,
    /// Unit of the body dimensions.
    pub units: LengthUnit,
}

/// A part package (e.g. `R0603`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    /// Package id.
    pub id: String,
    /// Body geometry, if known.
    pub footprint: Option<Footprint>,
}

/// A part being handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Part id.
    pub id: String,
    /// The part's package.
    pub package: Package,
}

/// A feeder presenting parts to the camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feeder {
    /// Feeder id.
    pub id: String,
    /// The part currently loaded, if any.
    pub part: Option<Part>,
}

/// The nozzle holding the part, for bottom-vision runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nozzle {
    /// Nozzle name.
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inches_to_millimeters() {
        let mm = LengthUnit::Inches.convert(1.0, LengthUnit::Millimeters);
        assert!((mm - 25.4).abs() < 1e-12);
    }

    #[test]
    fn units_per_pixel_conversion() {
        let upp = UnitsPerPixel {
            x: 0.01,
            y: 0.02,
            units: LengthUnit::Millimeters,
        }
        .convert_to(LengthUnit::Mils);
        assert!((upp.x - 0.01 / 0.0254).abs() < 1e-12);
        assert!((upp.y - 0.02 / 0.0254).abs() < 1e-12);
        assert_eq!(upp.units, LengthUnit::Mils);
    }
}
