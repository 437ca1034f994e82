//! Point and cloud primitives shared across the crate.
//!
//! Positions are `f32` (sensor resolution), statistics are accumulated in
//! `f64` elsewhere. Colors live in [`crate::color`].

use nalgebra::Point3;

use crate::color::Rgb;

/// Scale used to quantize positions into exact-match keys (0.1 mm at metric
/// scale). Haptic samples are logged at the voxel positions they touched, so
/// exact-match lookup after quantization is sufficient.
const KEY_SCALE: f32 = 1.0e4;

/// A 3-D point with its color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColoredPoint {
    /// Position in the sensor frame.
    pub position: Point3<f32>,
    /// Color, channels in 0..=255.
    pub color: Rgb,
}

impl ColoredPoint {
    /// Create a point from coordinates and a color.
    pub fn new(x: f32, y: f32, z: f32, color: Rgb) -> Self {
        Self {
            position: Point3::new(x, y, z),
            color,
        }
    }
}

/// A 3-D point with a region label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledPoint {
    /// Position in the sensor frame.
    pub position: Point3<f32>,
    /// Region label.
    pub label: u32,
}

/// A plain colored cloud.
pub type PointCloud = Vec<ColoredPoint>;

/// A labeled cloud, the output projection of a clustering state.
pub type LabeledCloud = Vec<LabeledPoint>;

/// Quantized position key for exact-match lookups across clouds (haptic
/// track matching, ground-truth alignment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PointKey(i64, i64, i64);

impl PointKey {
    /// Quantize a position.
    pub fn of(p: &Point3<f32>) -> Self {
        Self(
            (p.x * KEY_SCALE).round() as i64,
            (p.y * KEY_SCALE).round() as i64,
            (p.z * KEY_SCALE).round() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_key_exact_match() {
        let a = Point3::new(0.12345, -0.5, 2.0);
        let b = Point3::new(0.12345, -0.5, 2.0);
        assert_eq!(PointKey::of(&a), PointKey::of(&b));
    }

    #[test]
    fn test_point_key_distinguishes_distinct_positions() {
        let a = Point3::new(0.1234, 0.0, 0.0);
        let b = Point3::new(0.1239, 0.0, 0.0);
        assert_ne!(PointKey::of(&a), PointKey::of(&b));
    }
}
