//! Calibration: turning the three raw component distances into one fused
//! merge priority.
//!
//! Parameters are derived once from the distribution of raw deltas over
//! every edge of the initial graph, then applied uniformly:
//!
//! | Criterion | Parameters | Fusion |
//! |-----------|------------|--------|
//! | ManualLambda | user-supplied (λc, λg) | λc·δc + λg·δg + (1−λc−λg)·δh |
//! | AdaptiveLambda | λc = mean_h / (mean_c + mean_h), λg = 0 | same as above |
//! | Equalization | one empirical CDF per component | (cdf(δc) + cdf(δg) + cdf(δh)) / 3 |
//!
//! Equalization maps each component through its own quantile position, so
//! each contributes at most 1/3 regardless of raw scale. Adaptive keeps
//! λg at 0: geometry never enters the fused weight under that criterion.

use crate::distance::Deltas;

/// Strategy used to normalize and fuse the component distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergingCriterion {
    /// Fixed user-supplied lambda weights.
    ManualLambda,
    /// Lambda weights derived from the delta distributions.
    #[default]
    AdaptiveLambda,
    /// Histogram equalization of each component.
    Equalization,
}

/// Empirical CDF over [0, 1], sampled into a fixed number of bins.
#[derive(Debug, Clone, PartialEq)]
pub struct Cdf {
    cumulative: Vec<f32>,
}

impl Cdf {
    /// Build the CDF of a sampled distribution over `bins` histogram bins.
    ///
    /// A value that would floor into the bin just past the last index lands
    /// in the last bin. With no samples there is nothing to equalize and
    /// every bin saturates at 1.
    pub fn from_samples(samples: &[f32], bins: usize) -> Self {
        debug_assert!(bins > 0);
        if samples.is_empty() {
            return Self {
                cumulative: vec![1.0; bins],
            };
        }

        let mut counts = vec![0usize; bins];
        for &d in samples {
            counts[Self::bin_of(d, bins)] += 1;
        }

        let n = samples.len() as f32;
        let mut cumulative = Vec::with_capacity(bins);
        let mut acc = 0usize;
        for c in counts {
            acc += c;
            cumulative.push(acc as f32 / n);
        }
        Self { cumulative }
    }

    fn bin_of(d: f32, bins: usize) -> usize {
        ((d * bins as f32).floor() as usize).min(bins - 1)
    }

    /// Quantile position of a distance value.
    pub fn value(&self, d: f32) -> f32 {
        self.cumulative[Self::bin_of(d, self.cumulative.len())]
    }

    /// Number of histogram bins.
    pub fn bins(&self) -> usize {
        self.cumulative.len()
    }
}

/// Calibrated fusion parameters, computed once per initial graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Calibration {
    /// Lambda weighting (manual or adaptive).
    Lambda {
        /// Weight of the color component.
        lambda_c: f32,
        /// Weight of the geometric component.
        lambda_g: f32,
    },
    /// Per-component histogram equalization.
    Equalized {
        /// CDF of the color deltas.
        cdf_c: Cdf,
        /// CDF of the geometric deltas.
        cdf_g: Cdf,
        /// CDF of the haptic deltas.
        cdf_h: Cdf,
    },
}

impl Calibration {
    /// Fixed lambda weights. Validity of the weights is enforced at
    /// configuration time by the engine.
    pub fn manual(lambda_c: f32, lambda_g: f32) -> Self {
        Self::Lambda { lambda_c, lambda_g }
    }

    /// Adaptive lambda from the global means of the color and haptic delta
    /// distributions; geometry is excluded (λg = 0).
    pub fn adaptive(deltas_c: &[f32], deltas_h: &[f32]) -> Self {
        let mean_c = mean(deltas_c);
        let mean_h = mean(deltas_h);
        let lambda_c = if mean_c + mean_h > 0.0 {
            mean_h / (mean_c + mean_h)
        } else {
            // Degenerate distributions (e.g. single-color scene with no
            // haptics): fall back to an even color/haptic split.
            0.5
        };
        Self::Lambda {
            lambda_c,
            lambda_g: 0.0,
        }
    }

    /// Per-component equalization over `bins` histogram bins.
    pub fn equalized(deltas_c: &[f32], deltas_g: &[f32], deltas_h: &[f32], bins: usize) -> Self {
        Self::Equalized {
            cdf_c: Cdf::from_samples(deltas_c, bins),
            cdf_g: Cdf::from_samples(deltas_g, bins),
            cdf_h: Cdf::from_samples(deltas_h, bins),
        }
    }

    /// Fuse raw component distances into the merge-priority weight.
    pub fn fuse(&self, d: &Deltas) -> f32 {
        match self {
            Calibration::Lambda { lambda_c, lambda_g } => {
                lambda_c * d.color
                    + lambda_g * d.geometric
                    + (1.0 - lambda_c - lambda_g) * d.haptic
            }
            Calibration::Equalized {
                cdf_c,
                cdf_g,
                cdf_h,
            } => (cdf_c.value(d.color) + cdf_g.value(d.geometric) + cdf_h.value(d.haptic)) / 3.0,
        }
    }
}

/// Mean of a sampled distribution.
pub fn mean(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&d| d as f64).sum::<f64>() / samples.len() as f64) as f32
}
