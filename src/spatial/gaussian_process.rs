//! Gaussian-process regression over station coordinates.
//!
//! The kernel is a squared-exponential (RBF) term scaled by the target variance plus
//! an independent white-noise term. Inputs are `[longitude, latitude]` in degrees.
//! Hyper-parameters are picked from a fixed grid by log marginal likelihood, which
//! keeps fitting deterministic.

use crate::spatial::error::SpatialError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Candidate RBF length scales, in degrees.
pub const LENGTH_SCALE_GRID: [f64; 7] = [0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0];

/// Candidate white-noise levels, as a fraction of the signal variance.
pub const NOISE_FRACTION_GRID: [f64; 4] = [0.01, 0.05, 0.1, 0.5];

/// Minimum number of training points for a fit.
pub const MIN_TRAINING_POINTS: usize = 3;

/// A fitted Gaussian process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianProcess {
    x_train: Vec<[f64; 2]>,
    /// `K⁻¹ (y - mean)`.
    alpha: Vec<f64>,
    /// Lower Cholesky factor of `K`, row-major.
    chol: Vec<f64>,
    y_mean: f64,
    signal_variance: f64,
    noise: f64,
    length_scale: f64,
}

impl GaussianProcess {
    /// Fits the process, selecting the length scale and noise level from the grid.
    ///
    /// # Errors
    ///
    /// * [`SpatialError::NotEnoughStations`] for fewer than three points.
    /// * [`SpatialError::LengthMismatch`] if `points` and `values` differ in length.
    /// * [`SpatialError::NotPositiveDefinite`] if no grid point yields a valid factorization.
    pub fn fit(points: &[[f64; 2]], values: &[f64]) -> Result<Self, SpatialError> {
        if points.len() != values.len() {
            return Err(SpatialError::LengthMismatch {
                points: points.len(),
                targets: values.len(),
            });
        }
        if points.len() < MIN_TRAINING_POINTS {
            return Err(SpatialError::NotEnoughStations {
                required: MIN_TRAINING_POINTS,
                available: points.len(),
            });
        }

        let mut best: Option<(f64, Self)> = None;
        for &length_scale in &LENGTH_SCALE_GRID {
            for &noise_fraction in &NOISE_FRACTION_GRID {
                let Ok((gp, lml)) = Self::fit_with(points, values, length_scale, noise_fraction) else {
                    continue;
                };
                match &best {
                    Some((best_lml, _)) if *best_lml >= lml => {}
                    _ => best = Some((lml, gp)),
                }
            }
        }
        best.map(|(_, gp)| gp).ok_or(SpatialError::NotPositiveDefinite)
    }

    /// Fits with fixed hyper-parameters, returning the model and its log marginal likelihood.
    pub fn fit_with(
        points: &[[f64; 2]],
        values: &[f64],
        length_scale: f64,
        noise_fraction: f64,
    ) -> Result<(Self, f64), SpatialError> {
        if points.len() != values.len() {
            return Err(SpatialError::LengthMismatch {
                points: points.len(),
                targets: values.len(),
            });
        }
        let n = points.len();
        if n < MIN_TRAINING_POINTS {
            return Err(SpatialError::NotEnoughStations {
                required: MIN_TRAINING_POINTS,
                available: n,
            });
        }

        let y_mean = values.iter().sum::<f64>() / n as f64;
        let centred = DVector::from_iterator(n, values.iter().map(|v| v - y_mean));
        let variance = centred.iter().map(|v| v * v).sum::<f64>() / n as f64;
        let signal_variance = if variance > f64::EPSILON { variance } else { 1.0 };
        let noise = noise_fraction * signal_variance;

        let k = DMatrix::from_fn(n, n, |i, j| {
            let cov = rbf(&points[i], &points[j], signal_variance, length_scale);
            if i == j {
                cov + noise
            } else {
                cov
            }
        });
        let cholesky = k.cholesky().ok_or(SpatialError::NotPositiveDefinite)?;
        let alpha = cholesky.solve(&centred);
        let l = cholesky.l();

        let log_det_half: f64 = (0..n).map(|i| l[(i, i)].ln()).sum();
        let lml = -0.5 * centred.dot(&alpha) - log_det_half - 0.5 * n as f64 * (2.0 * PI).ln();

        let chol = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .map(|(i, j)| l[(i, j)])
            .collect();

        Ok((
            Self {
                x_train: points.to_vec(),
                alpha: alpha.iter().copied().collect(),
                chol,
                y_mean,
                signal_variance,
                noise,
                length_scale,
            },
            lml,
        ))
    }

    /// Predictive mean and standard deviation at `[longitude, latitude]`.
    ///
    /// The standard deviation includes the white-noise term.
    pub fn predict(&self, point: [f64; 2]) -> Result<(f64, f64), SpatialError> {
        let n = self.x_train.len();
        if self.alpha.len() != n || self.chol.len() != n * n {
            return Err(SpatialError::Corrupt(format!(
                "{} training points, {} weights, {} factor entries",
                n,
                self.alpha.len(),
                self.chol.len()
            )));
        }
        let k_star: Vec<f64> = self
            .x_train
            .iter()
            .map(|x| rbf(x, &point, self.signal_variance, self.length_scale))
            .collect();
        let mean = self.y_mean + k_star.iter().zip(&self.alpha).map(|(k, a)| k * a).sum::<f64>();

        // v = L⁻¹ k*, by forward substitution
        let mut v = vec![0.0; n];
        for i in 0..n {
            let row = &self.chol[i * n..i * n + i];
            let partial: f64 = row.iter().zip(&v).map(|(l, v)| l * v).sum();
            v[i] = (k_star[i] - partial) / self.chol[i * n + i];
        }
        let variance = self.signal_variance + self.noise - v.iter().map(|x| x * x).sum::<f64>();
        Ok((mean, variance.max(0.0).sqrt()))
    }

    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    pub fn noise(&self) -> f64 {
        self.noise
    }

    pub fn training_mean(&self) -> f64 {
        self.y_mean
    }

    pub fn n_training_points(&self) -> usize {
        self.x_train.len()
    }
}

fn rbf(a: &[f64; 2], b: &[f64; 2], signal_variance: f64, length_scale: f64) -> f64 {
    let d2 = (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2);
    signal_variance * (-d2 / (2.0 * length_scale * length_scale)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> (Vec<[f64; 2]>, Vec<f64>) {
        let mut points = Vec::new();
        let mut values = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                let (lon, lat) = (i as f64, j as f64);
                points.push([lon, lat]);
                values.push(10.0 + lon + 0.5 * lat);
            }
        }
        (points, values)
    }

    #[test]
    fn test_reproduces_training_points() {
        let (points, values) = grid();
        let gp = GaussianProcess::fit(&points, &values).unwrap();
        for (p, v) in points.iter().zip(&values) {
            let (mean, _) = gp.predict(*p).unwrap();
            assert!((mean - v).abs() < 0.5, "{:?}: {} vs {}", p, mean, v);
        }
    }

    #[test]
    fn test_uncertainty_grows_away_from_data() {
        let (points, values) = grid();
        let gp = GaussianProcess::fit(&points, &values).unwrap();
        let (_, near) = gp.predict([1.5, 1.5]).unwrap();
        let (far_mean, far) = gp.predict([170.0, -80.0]).unwrap();
        assert!(far > near);
        // far from every point the mean reverts to the training mean
        assert!((far_mean - gp.training_mean()).abs() < 1e-6);
    }

    #[test]
    fn test_requires_three_points() {
        let err = GaussianProcess::fit(&[[0.0, 0.0], [1.0, 1.0]], &[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            SpatialError::NotEnoughStations {
                required: 3,
                available: 2
            }
        );
    }

    #[test]
    fn test_constant_targets() {
        let points = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let gp = GaussianProcess::fit(&points, &[3.0, 3.0, 3.0]).unwrap();
        let (mean, std) = gp.predict([0.5, 0.5]).unwrap();
        assert!((mean - 3.0).abs() < 1e-9);
        assert!(std.is_finite());
    }
}
