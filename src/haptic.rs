//! Haptic exploration data: the force track recorded by a tactile probe and
//! the per-region friction measurement derived from it.
//!
//! A track maps probed surface positions to a 2-component force reading
//! (tangential and normal). The friction coefficient at a sample is the
//! magnitude ratio `|tangential / normal|`.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::cloud::PointKey;

/// One force reading from the tactile probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceReading {
    /// Force along the motion direction.
    pub tangential: f32,
    /// Force into the surface.
    pub normal: f32,
}

impl ForceReading {
    /// Friction coefficient implied by this reading.
    pub fn friction(&self) -> f32 {
        (self.tangential / self.normal).abs()
    }
}

/// A friction sample attached to a region: the probed position and the
/// friction coefficient measured there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HapticSample {
    /// Probed position (coincides with a member point of the region).
    pub position: Point3<f32>,
    /// Friction coefficient at this position.
    pub friction: f32,
}

/// The haptic exploration log: probed positions to force readings.
///
/// Positions are matched by quantized key, so a track sample lands on the
/// region member point it was recorded at.
#[derive(Debug, Clone, Default)]
pub struct HapticTrack {
    samples: HashMap<PointKey, ForceReading>,
}

impl HapticTrack {
    /// Create an empty track.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading at a position. A repeated position overwrites.
    pub fn insert(&mut self, position: Point3<f32>, reading: ForceReading) {
        self.samples.insert(PointKey::of(&position), reading);
    }

    /// Reading at a position, if that position was probed.
    pub fn get(&self, position: &Point3<f32>) -> Option<&ForceReading> {
        self.samples.get(&PointKey::of(position))
    }

    /// Number of recorded readings.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the track holds no readings.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_friction_is_magnitude_ratio() {
        let r = ForceReading {
            tangential: -1.5,
            normal: 3.0,
        };
        assert_relative_eq!(r.friction(), 0.5);
    }

    #[test]
    fn test_track_lookup_by_position() {
        let mut track = HapticTrack::new();
        let p = Point3::new(0.1, 0.2, 0.3);
        track.insert(
            p,
            ForceReading {
                tangential: 1.0,
                normal: 2.0,
            },
        );

        assert_eq!(track.len(), 1);
        assert!(track.get(&Point3::new(0.1, 0.2, 0.3)).is_some());
        assert!(track.get(&Point3::new(0.4, 0.2, 0.3)).is_none());
    }
}
