//! Friction imputation: estimating the friction of never-touched regions
//! from their color, via a Gaussian mixture fitted over the touched ones.
//!
//! The pipeline runs once, before any merging:
//!
//! 1. accumulate background color statistics over *all* regions (running
//!    mean over region color means, pooled per-point covariance) and the
//!    friction mean over touched regions;
//! 2. draw `n_rows` synthetic samples from each touched region's joint
//!    (R, G, B, friction) Gaussian and pool them;
//! 3. fit the mixture; a 2-component fit gets the background component
//!    appended (weight [`ImputationConfig::background_weight`], fitted
//!    weights rescaled to keep total mass 1) — a fallback guarding against
//!    degenerate 2-component fits, not a general rule;
//! 4. regress friction from color for every untouched region.
//!
//! Untouched means "no haptic sample matched", not "friction equals 0": a
//! region measured at genuinely zero friction stays measured.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use nalgebra::{Cholesky, Matrix3, Matrix4, Vector3, Vector4};
use ndarray::Array2;
use rand::prelude::*;
use rand_distr::StandardNormal;

use crate::error::{Error, Result};
use crate::gmm::{self, FitConfig, MixtureModel, FEATURE_DIM};
use crate::region::Region;

/// Parameters of the imputation pass.
#[derive(Debug, Clone)]
pub struct ImputationConfig {
    /// Synthetic samples drawn per touched region.
    pub n_rows: usize,
    /// Mixture components to fit.
    pub n_components: usize,
    /// Weight given to the appended background component.
    pub background_weight: f64,
    /// Subtract the predicted variance when a prediction lands at ≥ 1.
    /// There is no symmetric branch for negative predictions.
    pub correct_overshoot: bool,
    /// Seed for sampling and the EM initialization.
    pub seed: Option<u64>,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            n_rows: 100,
            n_components: 2,
            background_weight: 0.2,
            correct_overshoot: true,
            seed: None,
        }
    }
}

/// Fill in friction estimates for every untouched region.
///
/// Returns the fitted mixture, or `None` when no region carries a haptic
/// sample (nothing to fit from; untouched estimates stay at zero).
pub fn impute_frictions(
    segments: &mut BTreeMap<u32, Region>,
    config: &ImputationConfig,
) -> Result<Option<MixtureModel>> {
    if segments.is_empty() {
        return Err(Error::EmptyInput);
    }

    let (background_mean, background_cov) = background_statistics(segments);

    let touched: Vec<u32> = segments
        .iter()
        .filter(|(_, r)| r.measured_friction().is_some())
        .map(|(&id, _)| id)
        .collect();
    if touched.is_empty() {
        warn!("no haptic samples in any region; friction estimates stay at zero");
        return Ok(None);
    }

    let mut rng: StdRng = match config.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    let pooled = pool_synthetic_samples(segments, &touched, config.n_rows, &mut rng)?;
    info!(
        "imputation: {} touched region(s), {} pooled sample(s)",
        touched.len(),
        pooled.nrows()
    );

    let fit_config = FitConfig {
        n_components: config.n_components,
        seed: config.seed,
        ..Default::default()
    };
    let mut model = gmm::fit(&pooled, &fit_config)?;

    if model.n_components() == 2 {
        for w in &mut model.weights {
            *w *= 1.0 - config.background_weight;
        }
        model.weights.push(config.background_weight);
        model.means.push(background_mean);
        model.covariances.push(background_cov);
        debug!("appended background component to a 2-component fit");
    }

    for (id, region) in segments.iter_mut() {
        if region.measured_friction().is_some() {
            continue;
        }
        let c = region.mean_color();
        let query = Vector3::new(c.r as f64, c.g as f64, c.b as f64);
        let (mut value, variance) = gmm::regress(&model, &query)?;
        if config.correct_overshoot && value >= 1.0 {
            value -= variance;
        }
        debug!(
            "region {id}: imputed friction {value:.4} (variance {variance:.4})"
        );
        region.set_imputed(value as f32, variance.max(0.0) as f32);
    }

    Ok(Some(model))
}

/// Background mean and covariance over the joint feature space.
///
/// The color mean is a running mean over region color means; the color
/// covariance pools per-point deviations across all regions against that
/// running mean. The friction mean runs over touched regions only. The
/// friction row and column of the covariance are held at 1, matching the
/// original calibration of the background class.
fn background_statistics(segments: &BTreeMap<u32, Region>) -> (Vector4<f64>, Matrix4<f64>) {
    let mut mean = Vector4::<f64>::zeros();
    let mut acc = Matrix3::<f64>::zeros();
    let mut region_count = 0.0f64;
    let mut point_count = 0.0f64;
    let mut touched_count = 0.0f64;

    for region in segments.values() {
        region_count += 1.0;
        let c = region.mean_color();
        let region_mean = Vector3::new(c.r as f64, c.g as f64, c.b as f64);
        let last: Vector3<f64> = mean.fixed_rows::<3>(0).into_owned();
        let updated = last + (region_mean - last) / region_count;
        mean.fixed_rows_mut::<3>(0).copy_from(&updated);

        for p in region.points() {
            let [r, g, b] = p.color.channels();
            let d_last = Vector3::new(r as f64, g as f64, b as f64) - last;
            let d_new = Vector3::new(r as f64, g as f64, b as f64) - updated;
            acc[(0, 0)] += d_last.x * d_new.x;
            acc[(1, 1)] += d_last.y * d_new.y;
            acc[(2, 2)] += d_last.z * d_new.z;
            acc[(0, 1)] += d_last.x * d_new.y;
            acc[(0, 2)] += d_last.x * d_new.z;
            acc[(1, 2)] += d_last.y * d_new.z;
            point_count += 1.0;
        }

        if let Some(stats) = region.joint_stats() {
            touched_count += 1.0;
            mean[3] += (stats.mean[3] - mean[3]) / touched_count;
        }
    }

    let mut cov = Matrix4::<f64>::from_element(1.0);
    if point_count > 0.0 {
        for (i, j) in [(0, 0), (1, 1), (2, 2), (0, 1), (0, 2), (1, 2)] {
            cov[(i, j)] = acc[(i, j)] / point_count;
            cov[(j, i)] = cov[(i, j)];
        }
    }

    (mean, cov)
}

/// Draw `n_rows` samples from every touched region's joint Gaussian into
/// one pooled matrix.
fn pool_synthetic_samples(
    segments: &BTreeMap<u32, Region>,
    touched: &[u32],
    n_rows: usize,
    rng: &mut StdRng,
) -> Result<Array2<f64>> {
    let mut data = Vec::with_capacity(touched.len() * n_rows * FEATURE_DIM);

    for id in touched {
        let stats = segments[id].joint_stats().ok_or_else(|| {
            Error::DegenerateMixture(format!("region {id}: missing joint statistics"))
        })?;
        // Light ridge so single-sample regions stay decomposable.
        let cov = stats.covariance + Matrix4::identity() * 1e-6;
        let chol = Cholesky::new(cov).ok_or_else(|| {
            Error::DegenerateMixture(format!("region {id}: joint covariance not positive definite"))
        })?;
        let l = chol.l();

        for _ in 0..n_rows {
            let z = Vector4::new(
                rng.sample::<f64, _>(StandardNormal),
                rng.sample::<f64, _>(StandardNormal),
                rng.sample::<f64, _>(StandardNormal),
                rng.sample::<f64, _>(StandardNormal),
            );
            let x = stats.mean + l * z;
            data.extend_from_slice(&[x[0], x[1], x[2], x[3]]);
        }
    }

    Array2::from_shape_vec((touched.len() * n_rows, FEATURE_DIM), data)
        .map_err(|e| Error::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::ColoredPoint;
    use crate::color::Rgb;
    use crate::haptic::{ForceReading, HapticTrack};

    /// Per-point color jitter, linearly independent across channels so the
    /// joint color covariance stays full rank.
    const JITTER_R: [f32; 4] = [0.0, 1.0, 2.0, 3.0];
    const JITTER_G: [f32; 4] = [0.0, 2.0, 1.0, 3.5];
    const JITTER_B: [f32; 4] = [1.0, 0.0, 2.5, 0.5];

    /// A small region around `(x, 0, 1)` with colors near `shade` and, if
    /// `friction` is given, a track probing every point at that friction.
    fn make_region(
        x: f32,
        shade: f32,
        friction: Option<f32>,
        track: &mut HapticTrack,
    ) -> Region {
        let mut points = Vec::new();
        for i in 0..4 {
            points.push(ColoredPoint::new(
                x + i as f32 * 0.01,
                0.0,
                1.0,
                Rgb::new(
                    shade + JITTER_R[i],
                    shade + JITTER_G[i],
                    shade + JITTER_B[i],
                ),
            ));
        }
        if let Some(f) = friction {
            for p in &points {
                track.insert(
                    p.position,
                    ForceReading {
                        // Spread the per-sample readings slightly around f.
                        tangential: f + (p.position.x - x) * 0.1,
                        normal: 1.0,
                    },
                );
            }
        }
        Region::build(points, Some(track)).unwrap()
    }

    fn config() -> ImputationConfig {
        ImputationConfig {
            seed: Some(9),
            ..Default::default()
        }
    }

    #[test]
    fn test_impute_fills_untouched_regions() {
        let mut track = HapticTrack::new();
        let mut segments = BTreeMap::new();
        // Touched: dark regions are slippery, bright regions grippy.
        segments.insert(0, make_region(0.0, 30.0, Some(0.2), &mut track));
        segments.insert(1, make_region(1.0, 35.0, Some(0.22), &mut track));
        segments.insert(2, make_region(2.0, 200.0, Some(0.8), &mut track));
        segments.insert(3, make_region(3.0, 205.0, Some(0.78), &mut track));
        // Untouched: one dark, one bright.
        segments.insert(4, make_region(4.0, 32.0, None, &mut track));
        segments.insert(5, make_region(5.0, 202.0, None, &mut track));

        let model = impute_frictions(&mut segments, &config()).unwrap().unwrap();
        // 2 fitted components plus the appended background.
        assert_eq!(model.n_components(), 3);
        let total: f64 = model.weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);

        let dark = &segments[&4];
        let bright = &segments[&5];
        assert!(dark.measured_friction().is_none());
        assert!(dark.friction_variance() >= 0.0);
        assert!(bright.friction_variance() >= 0.0);
        // Imputed estimates follow the color groups.
        assert!((dark.friction() - 0.21).abs() < 0.15, "{}", dark.friction());
        assert!(
            (bright.friction() - 0.79).abs() < 0.15,
            "{}",
            bright.friction()
        );
        // Touched regions are left untouched by the regression.
        assert!((segments[&0].friction() - 0.2).abs() < 5e-3);
        assert_eq!(segments[&0].friction_variance(), 0.0);
    }

    #[test]
    fn test_no_track_means_no_model() {
        let mut track = HapticTrack::new();
        let mut segments = BTreeMap::new();
        segments.insert(0, make_region(0.0, 30.0, None, &mut track));
        segments.insert(1, make_region(1.0, 200.0, None, &mut track));

        let model = impute_frictions(&mut segments, &config()).unwrap();
        assert!(model.is_none());
        assert_eq!(segments[&0].friction(), 0.0);
        assert_eq!(segments[&0].friction_variance(), 0.0);
    }

    #[test]
    fn test_measured_zero_is_not_reimputed() {
        let mut track = HapticTrack::new();
        let mut segments = BTreeMap::new();
        segments.insert(0, make_region(0.0, 30.0, Some(0.3), &mut track));
        segments.insert(1, make_region(1.0, 210.0, Some(0.7), &mut track));
        // Frictionless but genuinely measured.
        segments.insert(2, make_region(2.0, 120.0, Some(0.0), &mut track));
        segments.insert(3, make_region(3.0, 125.0, None, &mut track));

        impute_frictions(&mut segments, &config()).unwrap();

        let measured_zero = &segments[&2];
        assert!(measured_zero.measured_friction().is_some());
        assert_eq!(measured_zero.friction_variance(), 0.0);

        let imputed = &segments[&3];
        assert!(imputed.measured_friction().is_none());
        assert!(imputed.friction_variance() >= 0.0);
    }

    #[test]
    fn test_empty_segments_error() {
        let mut segments: BTreeMap<u32, Region> = BTreeMap::new();
        assert!(matches!(
            impute_frictions(&mut segments, &config()),
            Err(Error::EmptyInput)
        ));
    }
}
