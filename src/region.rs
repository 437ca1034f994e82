//! The region (supervoxel) model: one current cluster of points with its
//! aggregated color, geometry, and friction descriptors.
//!
//! A region is created once from the external over-segmentation, or
//! synthesized by a merge; the two parents of a merge are removed
//! atomically by the engine, so ownership of a point set is always
//! exclusive to one live region.

use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use crate::cloud::ColoredPoint;
use crate::color::{self, Rgb};
use crate::error::{Error, Result};
use crate::geometry::{self, PointIndex};
use crate::haptic::{HapticSample, HapticTrack};

/// Joint statistics over the (R, G, B, friction) feature space, computed
/// for regions with at least one haptic sample and consumed by the
/// mixture-fit step of the imputation.
#[derive(Debug, Clone, PartialEq)]
pub struct JointStats {
    /// Mean feature vector.
    pub mean: Vector4<f64>,
    /// Feature covariance.
    pub covariance: Matrix4<f64>,
}

/// One cluster of points during merging.
#[derive(Debug, Clone)]
pub struct Region {
    points: Vec<ColoredPoint>,
    centroid: Point3<f32>,
    normal: Vector3<f32>,
    curvature: f32,
    haptic_samples: Vec<HapticSample>,
    /// `Some` iff at least one haptic sample matched a member point.
    /// Keeps a measured zero distinguishable from "never touched".
    measured_friction: Option<f32>,
    friction: f32,
    friction_variance: f32,
    joint_stats: Option<JointStats>,
}

impl Region {
    /// Wrap a segment of the external over-segmentation into a region,
    /// measuring friction against the haptic track if one is given.
    pub fn build(points: Vec<ColoredPoint>, track: Option<&HapticTrack>) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::EmptyInput);
        }

        let centroid = geometry::centroid(&points);
        let (normal, curvature) = geometry::normal_and_curvature(&points);

        let mut region = Self {
            points,
            centroid,
            normal,
            curvature,
            haptic_samples: Vec::new(),
            measured_friction: None,
            friction: 0.0,
            friction_variance: 0.0,
            joint_stats: None,
        };

        if let Some(track) = track {
            region.measure_friction(track);
        }
        Ok(region)
    }

    /// Match member points against the track, accumulate the friction mean,
    /// and derive the joint color+friction statistics.
    fn measure_friction(&mut self, track: &HapticTrack) {
        if track.is_empty() {
            return;
        }

        let mut count = 0.0f32;
        let mut mean_f = 0.0f32;
        for p in &self.points {
            if let Some(reading) = track.get(&p.position) {
                let f = reading.friction();
                count += 1.0;
                mean_f += (f - mean_f) / count;
                self.haptic_samples.push(HapticSample {
                    position: p.position,
                    friction: f,
                });
            }
        }

        if count > 0.0 {
            self.measured_friction = Some(mean_f.max(0.0));
            self.friction = mean_f.max(0.0);
            self.friction_variance = 0.0;
            self.joint_stats = Some(self.compute_joint_stats());
        }
    }

    /// Joint (R, G, B, friction) mean and covariance: color moments over all
    /// member points, friction moments over the haptic samples, and the
    /// color-friction cross terms over each sample paired with its nearest
    /// member point.
    fn compute_joint_stats(&self) -> JointStats {
        let n = self.points.len() as f64;
        let mut mean_c = Vector3::<f64>::zeros();
        for p in &self.points {
            let [r, g, b] = p.color.channels();
            mean_c += Vector3::new(r as f64, g as f64, b as f64);
        }
        mean_c /= n;

        let mut cov_cc = nalgebra::Matrix3::<f64>::zeros();
        for p in &self.points {
            let [r, g, b] = p.color.channels();
            let d = Vector3::new(r as f64, g as f64, b as f64) - mean_c;
            cov_cc += d * d.transpose();
        }
        cov_cc /= n;

        let m = self.haptic_samples.len() as f64;
        let mean_f = self
            .haptic_samples
            .iter()
            .map(|s| s.friction as f64)
            .sum::<f64>()
            / m;
        let var_f = self
            .haptic_samples
            .iter()
            .map(|s| {
                let d = s.friction as f64 - mean_f;
                d * d
            })
            .sum::<f64>()
            / m;

        let index = PointIndex::new(&self.points);
        let mut cov_cf = Vector3::<f64>::zeros();
        for s in &self.haptic_samples {
            if let Some(i) = index.nearest(&s.position) {
                let [r, g, b] = self.points[i].color.channels();
                let dc = Vector3::new(r as f64, g as f64, b as f64) - mean_c;
                cov_cf += dc * (s.friction as f64 - mean_f);
            }
        }
        cov_cf /= m;

        let mean = Vector4::new(mean_c.x, mean_c.y, mean_c.z, mean_f);
        let mut covariance = Matrix4::<f64>::zeros();
        covariance.fixed_view_mut::<3, 3>(0, 0).copy_from(&cov_cc);
        covariance.fixed_view_mut::<3, 1>(0, 3).copy_from(&cov_cf);
        covariance
            .fixed_view_mut::<1, 3>(3, 0)
            .copy_from(&cov_cf.transpose());
        covariance[(3, 3)] = var_f;

        JointStats { mean, covariance }
    }

    /// Merge two regions into a new one: pooled points, recomputed
    /// geometry, pooled haptic samples, combined friction.
    ///
    /// The friction of the merged region is the sample-count-weighted
    /// average of the parents when the pooled sample count is non-zero, and
    /// a plain average of the two estimates otherwise.
    pub fn merge(a: &Region, b: &Region) -> Region {
        let mut points = a.points.clone();
        points.extend_from_slice(&b.points);

        let centroid = geometry::centroid(&points);
        let (normal, curvature) = geometry::normal_and_curvature(&points);

        let mut haptic_samples = a.haptic_samples.clone();
        haptic_samples.extend_from_slice(&b.haptic_samples);

        let (measured_friction, friction, friction_variance) = if !haptic_samples.is_empty() {
            let (na, nb) = (a.haptic_samples.len() as f32, b.haptic_samples.len() as f32);
            let f = (na * a.friction + nb * b.friction) / (na + nb);
            (Some(f), f, 0.0)
        } else {
            (
                None,
                0.5 * (a.friction + b.friction),
                0.5 * (a.friction_variance + b.friction_variance),
            )
        };

        Region {
            points,
            centroid,
            normal,
            curvature,
            haptic_samples,
            measured_friction,
            friction,
            friction_variance,
            // Only consumed by the pre-merge imputation pass.
            joint_stats: None,
        }
    }

    /// Overwrite the friction estimate with a regressed value.
    pub fn set_imputed(&mut self, friction: f32, variance: f32) {
        self.friction = friction;
        self.friction_variance = variance;
    }

    /// Member points.
    pub fn points(&self) -> &[ColoredPoint] {
        &self.points
    }

    /// Number of member points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the region has no points. Regions are kept non-empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Region centroid.
    pub fn centroid(&self) -> Point3<f32> {
        self.centroid
    }

    /// Unit surface normal.
    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    /// Surface-variation curvature.
    pub fn curvature(&self) -> f32 {
        self.curvature
    }

    /// Mean color over the member points.
    pub fn mean_color(&self) -> Rgb {
        color::mean_color(&self.points)
    }

    /// Haptic samples matched to this region.
    pub fn haptic_samples(&self) -> &[HapticSample] {
        &self.haptic_samples
    }

    /// Directly measured friction, if any sample matched.
    pub fn measured_friction(&self) -> Option<f32> {
        self.measured_friction
    }

    /// Effective friction estimate (measured or imputed).
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Imputation uncertainty; 0 for directly measured regions.
    pub fn friction_variance(&self) -> f32 {
        self.friction_variance
    }

    /// Joint color+friction statistics, present for touched regions.
    pub fn joint_stats(&self) -> Option<&JointStats> {
        self.joint_stats.as_ref()
    }
}
