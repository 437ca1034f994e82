//! Distance engine: the three raw component distances (color, geometric,
//! haptic) between two regions.
//!
//! Each component has interchangeable policies selected at configuration
//! time; all raw values are symmetric, color and geometry land in [0, 1],
//! haptic is non-negative. Fusion into a single merge priority is the
//! calibration's job ([`crate::calibration`]).

use nalgebra::Vector3;

use crate::color;
use crate::region::Region;

/// Color distance policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorDistance {
    /// CIEDE2000 over CIELAB, normalized by [`color::LAB_RANGE`].
    #[default]
    LabCiede2000,
    /// Euclidean RGB distance, normalized by [`color::RGB_RANGE`].
    RgbEuclidean,
}

/// Geometric distance policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometricDistance {
    /// Normal misalignment combined with centroid-direction alignment.
    #[default]
    NormalsDiff,
    /// [`GeometricDistance::NormalsDiff`], halved when the two surfaces
    /// meet in a locally convex configuration.
    ConvexNormalsDiff,
}

/// Haptic distance policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HapticDistance {
    /// Absolute difference of the two regions' friction estimates.
    #[default]
    AverageFriction,
}

/// The raw, unfused component distances between two regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deltas {
    /// Color component, in [0, 1].
    pub color: f32,
    /// Geometric component, in [0, 1].
    pub geometric: f32,
    /// Haptic component, non-negative.
    pub haptic: f32,
}

/// The three active distance policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DistancePolicies {
    /// Color policy.
    pub color: ColorDistance,
    /// Geometric policy.
    pub geometric: GeometricDistance,
    /// Haptic policy.
    pub haptic: HapticDistance,
}

impl DistancePolicies {
    /// Compute all three component distances between two regions.
    pub fn deltas(&self, r1: &Region, r2: &Region) -> Deltas {
        let c1 = r1.mean_color();
        let c2 = r2.mean_color();
        let color = match self.color {
            ColorDistance::LabCiede2000 => {
                (color::lab_ciede2000(&c1, &c2) / color::LAB_RANGE).min(1.0)
            }
            ColorDistance::RgbEuclidean => color::rgb_euclidean(&c1, &c2) / color::RGB_RANGE,
        };

        let geometric = match self.geometric {
            GeometricDistance::NormalsDiff => normals_diff(r1, r2),
            GeometricDistance::ConvexNormalsDiff => {
                let d = normals_diff(r1, r2);
                if is_convex(r1, r2) {
                    d * 0.5
                } else {
                    d
                }
            }
        };

        let haptic = match self.haptic {
            HapticDistance::AverageFriction => (r1.friction() - r2.friction()).abs(),
        };

        Deltas {
            color,
            geometric,
            haptic,
        }
    }
}

/// Unit direction from the second centroid to the first, or `None` when the
/// centroids coincide.
fn centroid_direction(r1: &Region, r2: &Region) -> Option<Vector3<f32>> {
    let c = r1.centroid() - r2.centroid();
    let norm = c.norm();
    if norm > 0.0 {
        Some(c / norm)
    } else {
        None
    }
}

/// Geometric distance: the angle between the normals (cross-product
/// magnitude) averaged with each normal's alignment against the
/// inter-centroid direction.
fn normals_diff(r1: &Region, r2: &Region) -> f32 {
    let n1 = r1.normal();
    let n2 = r2.normal();
    let cross = n1.cross(&n2).norm();

    match centroid_direction(r1, r2) {
        Some(c) => (cross + n1.dot(&c).abs() + n2.dot(&c).abs()) / 3.0,
        // Coincident centroids: only the normal angle is informative.
        None => cross / 3.0,
    }
}

/// Convexity test: the pair is locally convex when the first normal's
/// projection onto the inter-centroid direction is at least the second's.
/// Symmetric under argument swap (both projections flip sign together).
fn is_convex(r1: &Region, r2: &Region) -> bool {
    match centroid_direction(r1, r2) {
        Some(c) => r1.normal().dot(&c) >= r2.normal().dot(&c),
        None => false,
    }
}
