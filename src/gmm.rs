//! Mixture provider: Gaussian mixture fitting over the joint
//! (R, G, B, friction) feature space and mixture regression from color to
//! friction.
//!
//! `fit` is a full-covariance EM:
//!
//! - **E-step**: responsibilities from component log-densities,
//!   normalized with log-sum-exp for stability.
//! - **M-step**: responsibility-weighted means, covariances (ridge
//!   regularized), and mixing weights.
//!
//! `regress` is standard Gaussian mixture regression: each component is
//! conditioned on the color block, the conditional means are blended by
//! the components' posterior responsibility at the query point, and the
//! blended second moment yields the predictive variance.

use nalgebra::{Cholesky, Matrix3, Matrix4, Vector3, Vector4};
use ndarray::Array2;
use rand::prelude::*;

use crate::error::{Error, Result};

/// Number of feature dimensions (R, G, B, friction).
pub const FEATURE_DIM: usize = 4;

/// A fitted Gaussian mixture over the joint color+friction space.
#[derive(Debug, Clone)]
pub struct MixtureModel {
    /// Mixing weights, summing to 1.
    pub weights: Vec<f64>,
    /// Component means.
    pub means: Vec<Vector4<f64>>,
    /// Component covariances.
    pub covariances: Vec<Matrix4<f64>>,
}

impl MixtureModel {
    /// Number of components.
    pub fn n_components(&self) -> usize {
        self.weights.len()
    }
}

/// EM fit parameters.
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Number of components to fit.
    pub n_components: usize,
    /// Maximum EM iterations.
    pub max_iter: usize,
    /// Log-likelihood convergence tolerance (per sample).
    pub tol: f64,
    /// Ridge added to covariance diagonals.
    pub reg_covar: f64,
    /// Random seed for initialization.
    pub seed: Option<u64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            n_components: 2,
            max_iter: 100,
            tol: 1e-4,
            reg_covar: 1e-6,
            seed: None,
        }
    }
}

/// Fit a Gaussian mixture to pooled samples (one row per sample,
/// [`FEATURE_DIM`] columns).
pub fn fit(samples: &Array2<f64>, config: &FitConfig) -> Result<MixtureModel> {
    let n = samples.nrows();
    if n == 0 {
        return Err(Error::EmptyInput);
    }
    if samples.ncols() != FEATURE_DIM {
        return Err(Error::DimensionMismatch {
            expected: FEATURE_DIM,
            found: samples.ncols(),
        });
    }
    if config.n_components == 0 {
        return Err(Error::InvalidConfiguration {
            name: "n_components",
            message: "must be > 0",
        });
    }
    let k = config.n_components.min(n);

    let rows: Vec<Vector4<f64>> = (0..n).map(|i| row_vector(samples, i)).collect();

    let mut rng: StdRng = match config.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    // Means start at random samples, covariances at the (regularized)
    // global data covariance, weights uniform.
    let global_mean = rows.iter().sum::<Vector4<f64>>() / n as f64;
    let mut global_cov = Matrix4::<f64>::zeros();
    for x in &rows {
        let d = x - global_mean;
        global_cov += d * d.transpose();
    }
    global_cov /= n as f64;
    global_cov += Matrix4::identity() * config.reg_covar.max(1e-9);

    // Farthest-point initialization: one random seed row, then rows that
    // maximize the distance to the means chosen so far.
    let mut means: Vec<Vector4<f64>> = Vec::with_capacity(k);
    means.push(rows[rng.random_range(0..n)]);
    while means.len() < k {
        let spread = |x: &Vector4<f64>| {
            means
                .iter()
                .map(|m| (x - m).norm_squared())
                .fold(f64::INFINITY, f64::min)
        };
        let far = rows
            .iter()
            .max_by(|a, b| spread(a).total_cmp(&spread(b)))
            .copied()
            .unwrap_or(rows[0]);
        means.push(far);
    }
    let mut covariances = vec![global_cov; k];
    let mut weights = vec![1.0 / k as f64; k];

    let mut resp = vec![vec![0.0f64; k]; n];
    let mut prev_ll = f64::NEG_INFINITY;

    for _iter in 0..config.max_iter {
        // E-step
        let chols: Vec<Cholesky<f64, nalgebra::Const<4>>> = covariances
            .iter()
            .map(|cov| regularized_cholesky(cov, config.reg_covar))
            .collect::<Result<_>>()?;

        let mut ll = 0.0;
        for (i, x) in rows.iter().enumerate() {
            let mut log_probs = vec![0.0f64; k];
            for c in 0..k {
                log_probs[c] = weights[c].ln() + log_gaussian(x, &means[c], &chols[c]);
            }
            let log_sum = logsumexp(&log_probs);
            ll += log_sum;
            for c in 0..k {
                resp[i][c] = (log_probs[c] - log_sum).exp();
            }
        }

        // M-step
        let resp_sum: Vec<f64> = (0..k).map(|c| (0..n).map(|i| resp[i][c]).sum()).collect();
        let total: f64 = resp_sum.iter().sum();

        for c in 0..k {
            weights[c] = resp_sum[c] / total;
            if resp_sum[c] <= 1e-10 {
                // Emptied component: keep its previous parameters.
                continue;
            }
            let mut mean = Vector4::<f64>::zeros();
            for (i, x) in rows.iter().enumerate() {
                mean += resp[i][c] * x;
            }
            mean /= resp_sum[c];

            let mut cov = Matrix4::<f64>::zeros();
            for (i, x) in rows.iter().enumerate() {
                let d = x - mean;
                cov += resp[i][c] * d * d.transpose();
            }
            cov /= resp_sum[c];
            cov += Matrix4::identity() * config.reg_covar;

            means[c] = mean;
            covariances[c] = cov;
        }

        if (ll - prev_ll).abs() < config.tol * n as f64 {
            break;
        }
        prev_ll = ll;
    }

    Ok(MixtureModel {
        weights,
        means,
        covariances,
    })
}

/// Regress friction from a color query through the mixture: posterior-
/// responsibility-blended conditional mean and variance (3 dims in, 1 out).
pub fn regress(model: &MixtureModel, query: &Vector3<f64>) -> Result<(f64, f64)> {
    let k = model.n_components();
    if k == 0 {
        return Err(Error::DegenerateMixture("mixture has no components".into()));
    }

    let mut log_h = vec![0.0f64; k];
    let mut cond_mean = vec![0.0f64; k];
    let mut cond_var = vec![0.0f64; k];

    for c in 0..k {
        let mean_x: Vector3<f64> = model.means[c].fixed_rows::<3>(0).into_owned();
        let mean_y = model.means[c][3];
        let cov = &model.covariances[c];
        let sigma_xx: Matrix3<f64> = cov.fixed_view::<3, 3>(0, 0).into_owned();
        let sigma_xy: Vector3<f64> = cov.fixed_view::<3, 1>(0, 3).into_owned();
        let sigma_yy = cov[(3, 3)];

        let chol = regularized_cholesky3(&sigma_xx, 1e-9)?;

        let d = query - mean_x;
        let solved = chol.solve(&d);
        let quad = d.dot(&solved);
        let log_det = 2.0 * chol.l().diagonal().map(|v| v.ln()).sum();
        log_h[c] = model.weights[c].ln()
            - 0.5 * (3.0 * (2.0 * std::f64::consts::PI).ln() + log_det + quad);

        let gain = chol.solve(&sigma_xy);
        cond_mean[c] = mean_y + gain.dot(&d);
        cond_var[c] = (sigma_yy - gain.dot(&sigma_xy)).max(0.0);
    }

    let log_sum = logsumexp(&log_h);
    let h: Vec<f64> = if log_sum.is_finite() {
        log_h.iter().map(|&l| (l - log_sum).exp()).collect()
    } else {
        // Query far outside every component: fall back to the priors.
        model.weights.clone()
    };

    let mean: f64 = (0..k).map(|c| h[c] * cond_mean[c]).sum();
    let second: f64 = (0..k)
        .map(|c| h[c] * (cond_var[c] + cond_mean[c] * cond_mean[c]))
        .sum();
    let variance = (second - mean * mean).max(0.0);

    Ok((mean, variance))
}

fn row_vector(samples: &Array2<f64>, i: usize) -> Vector4<f64> {
    let row = samples.row(i);
    Vector4::new(row[0], row[1], row[2], row[3])
}

/// Cholesky with escalating ridge; errors only if the matrix stays
/// indefinite after regularization.
fn regularized_cholesky(
    cov: &Matrix4<f64>,
    reg: f64,
) -> Result<Cholesky<f64, nalgebra::Const<4>>> {
    if let Some(chol) = Cholesky::new(*cov) {
        return Ok(chol);
    }
    let mut ridge = reg.max(1e-9);
    for _ in 0..8 {
        if let Some(chol) = Cholesky::new(cov + Matrix4::identity() * ridge) {
            return Ok(chol);
        }
        ridge *= 10.0;
    }
    Err(Error::DegenerateMixture(
        "covariance not positive definite".into(),
    ))
}

/// 3×3 counterpart of [`regularized_cholesky`], for the color block during
/// regression.
fn regularized_cholesky3(
    cov: &Matrix3<f64>,
    reg: f64,
) -> Result<Cholesky<f64, nalgebra::Const<3>>> {
    if let Some(chol) = Cholesky::new(*cov) {
        return Ok(chol);
    }
    let mut ridge = reg.max(1e-9);
    for _ in 0..8 {
        if let Some(chol) = Cholesky::new(cov + Matrix3::identity() * ridge) {
            return Ok(chol);
        }
        ridge *= 10.0;
    }
    Err(Error::DegenerateMixture(
        "color covariance not positive definite".into(),
    ))
}

fn log_gaussian(
    x: &Vector4<f64>,
    mean: &Vector4<f64>,
    chol: &Cholesky<f64, nalgebra::Const<4>>,
) -> f64 {
    let d = x - mean;
    let quad = d.dot(&chol.solve(&d));
    let log_det = 2.0 * chol.l().diagonal().map(|v| v.ln()).sum();
    -0.5 * (FEATURE_DIM as f64 * (2.0 * std::f64::consts::PI).ln() + log_det + quad)
}

fn logsumexp(values: &[f64]) -> f64 {
    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max_val.is_finite() {
        return max_val;
    }
    max_val
        + values
            .iter()
            .map(|&v| (v - max_val).exp())
            .sum::<f64>()
            .ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand_distr::Normal;

    /// Two tight clusters: dark+slippery, bright+grippy.
    fn two_cluster_samples(seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 2.0).unwrap();
        let f_noise = Normal::new(0.0, 0.01).unwrap();
        let mut data = Vec::new();
        for i in 0..200 {
            let (color, friction) = if i % 2 == 0 {
                (30.0, 0.2)
            } else {
                (200.0, 0.8)
            };
            data.push(color + rng.sample(noise));
            data.push(color + rng.sample(noise));
            data.push(color + rng.sample(noise));
            data.push(friction + rng.sample(f_noise));
        }
        Array2::from_shape_vec((200, 4), data).unwrap()
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let empty = Array2::<f64>::zeros((0, 4));
        assert!(matches!(
            fit(&empty, &FitConfig::default()),
            Err(Error::EmptyInput)
        ));

        let wrong = Array2::<f64>::zeros((3, 2));
        assert!(matches!(
            fit(&wrong, &FitConfig::default()),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_fit_recovers_two_components() {
        let samples = two_cluster_samples(7);
        let config = FitConfig {
            seed: Some(42),
            ..Default::default()
        };
        let model = fit(&samples, &config).unwrap();

        assert_eq!(model.n_components(), 2);
        assert_relative_eq!(model.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-9);

        let mut frictions: Vec<f64> = model.means.iter().map(|m| m[3]).collect();
        frictions.sort_by(|a, b| a.total_cmp(b));
        assert_relative_eq!(frictions[0], 0.2, epsilon = 0.05);
        assert_relative_eq!(frictions[1], 0.8, epsilon = 0.05);
    }

    #[test]
    fn test_regress_single_component_closed_form() {
        let mut cov = Matrix4::identity();
        cov[(0, 3)] = 0.5;
        cov[(3, 0)] = 0.5;
        let model = MixtureModel {
            weights: vec![1.0],
            means: vec![Vector4::new(0.0, 0.0, 0.0, 0.5)],
            covariances: vec![cov],
        };

        let (mean, var) = regress(&model, &Vector3::new(1.0, 0.0, 0.0)).unwrap();
        // mu_y + Sigma_yx Sigma_xx^-1 (x - mu_x) = 0.5 + 0.5*1
        assert_relative_eq!(mean, 1.0, epsilon = 1e-9);
        // sigma_yy - Sigma_yx Sigma_xx^-1 Sigma_xy = 1 - 0.25
        assert_relative_eq!(var, 0.75, epsilon = 1e-9);
    }

    #[test]
    fn test_fit_then_regress_predicts_friction_from_color() {
        let samples = two_cluster_samples(11);
        let config = FitConfig {
            seed: Some(1),
            ..Default::default()
        };
        let model = fit(&samples, &config).unwrap();

        let (dark, var_dark) = regress(&model, &Vector3::new(30.0, 30.0, 30.0)).unwrap();
        let (bright, _) = regress(&model, &Vector3::new(200.0, 200.0, 200.0)).unwrap();
        assert_relative_eq!(dark, 0.2, epsilon = 0.05);
        assert_relative_eq!(bright, 0.8, epsilon = 0.05);
        assert!(var_dark >= 0.0);
    }
}
