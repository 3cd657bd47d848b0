//! Coordinate-only PW estimation from station aggregates.
//!
//! The interpolator picks the best backend the station table supports: a Gaussian
//! process when at least three stations carry a PW value and the fit succeeds,
//! inverse-distance weighting when fewer stations do, and a linear function of the
//! absolute coordinates when none do.

use crate::predictor::LatLon;
use crate::spatial::error::SpatialError;
use crate::spatial::gaussian_process::{GaussianProcess, MIN_TRAINING_POINTS};
use crate::spatial::idw::InverseDistanceWeighting;
use crate::spatial::locate_station::StationIndex;
use crate::types::prediction::PredictionMethod;
use crate::types::station::StationLocation;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// When to stop trusting the kernel and answer with the regional mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtrapolationPolicy {
    /// Predictive standard deviation above which extrapolation is considered.
    pub std_threshold: f64,
    /// Minimum distance (degrees) to every station for extrapolation to apply.
    pub distance_threshold_deg: f64,
    /// Factor applied to the standard deviation of an extrapolated answer.
    pub uncertainty_multiplier: f64,
    /// Regional mean used when no station carries a PW value.
    pub default_regional_mean: f64,
}

impl Default for ExtrapolationPolicy {
    fn default() -> Self {
        Self {
            std_threshold: 1.0,
            distance_threshold_deg: 5.0,
            uncertainty_multiplier: 2.0,
            default_regional_mean: 2.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialSettings {
    pub extrapolation: ExtrapolationPolicy,
    pub idw: InverseDistanceWeighting,
    /// Fixed uncertainty reported by the IDW backend.
    pub idw_uncertainty: f64,
    /// Fixed uncertainty reported by the linear last resort.
    pub approximate_uncertainty: f64,
}

impl Default for SpatialSettings {
    fn default() -> Self {
        Self {
            extrapolation: ExtrapolationPolicy::default(),
            idw: InverseDistanceWeighting::default(),
            idw_uncertainty: 0.25,
            approximate_uncertainty: 0.35,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SpatialBackend {
    GaussianProcess(GaussianProcess),
    InverseDistance,
    Linear,
}

/// One spatial answer, before orchestrator-level adjustments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEstimate {
    pub pw_mm: f64,
    pub uncertainty: f64,
    pub method: PredictionMethod,
}

#[derive(Debug, Clone)]
pub struct SpatialInterpolator {
    backend: SpatialBackend,
    index: StationIndex,
    regional_mean: Option<f64>,
    settings: SpatialSettings,
}

impl SpatialInterpolator {
    /// Fits on the station table, degrading GP → IDW → linear as the data allows.
    pub fn fit(stations: Vec<StationLocation>, settings: SpatialSettings) -> Self {
        let valid: Vec<&StationLocation> = stations.iter().filter(|s| s.has_valid_pw()).collect();
        let gp = if valid.len() >= MIN_TRAINING_POINTS {
            let points: Vec<[f64; 2]> = valid.iter().map(|s| [s.longitude, s.latitude]).collect();
            let values: Vec<f64> = valid.iter().filter_map(|s| s.pw_mm).collect();
            match GaussianProcess::fit(&points, &values) {
                Ok(gp) => Some(gp),
                Err(e) => {
                    warn!("Gaussian process fit failed, degrading to IDW: {}", e);
                    None
                }
            }
        } else {
            debug!(
                "{} stations with PW, below the {} needed for a Gaussian process",
                valid.len(),
                MIN_TRAINING_POINTS
            );
            None
        };
        Self::from_parts(gp, stations, settings)
    }

    /// Assembles an interpolator from a pre-fitted GP (if any) and the station table.
    pub fn from_parts(
        spatial_model: Option<GaussianProcess>,
        stations: Vec<StationLocation>,
        settings: SpatialSettings,
    ) -> Self {
        let pw: Vec<f64> = stations
            .iter()
            .filter(|s| s.has_valid_pw())
            .filter_map(|s| s.pw_mm)
            .collect();
        let regional_mean = (!pw.is_empty()).then(|| pw.iter().sum::<f64>() / pw.len() as f64);

        let backend = match spatial_model {
            Some(gp) => SpatialBackend::GaussianProcess(gp),
            None if !pw.is_empty() => SpatialBackend::InverseDistance,
            None => SpatialBackend::Linear,
        };

        Self {
            backend,
            index: StationIndex::new(stations),
            regional_mean,
            settings,
        }
    }

    pub fn backend(&self) -> &SpatialBackend {
        &self.backend
    }

    pub fn regional_mean(&self) -> f64 {
        self.regional_mean
            .unwrap_or(self.settings.extrapolation.default_regional_mean)
    }

    /// Estimates PW at a coordinate.
    ///
    /// # Errors
    ///
    /// Returns a [`SpatialError`] if the backend cannot produce a value, which the
    /// orchestrator answers with its fallback formula.
    pub fn estimate(&self, query: LatLon) -> Result<SpatialEstimate, SpatialError> {
        let LatLon(lat, lon) = query;
        match &self.backend {
            SpatialBackend::GaussianProcess(gp) => {
                let (mean, std) = gp.predict([lon, lat])?;
                let policy = &self.settings.extrapolation;
                if std > policy.std_threshold {
                    let far = self
                        .index
                        .nearest_with_pw(lat, lon)
                        .map_or(true, |(_, d)| d > policy.distance_threshold_deg);
                    if far {
                        debug!("({}, {}) is outside the network, using the regional mean", lat, lon);
                        return Ok(SpatialEstimate {
                            pw_mm: self.regional_mean(),
                            uncertainty: std * policy.uncertainty_multiplier,
                            method: PredictionMethod::SpatialExtrapolation,
                        });
                    }
                }
                Ok(SpatialEstimate {
                    pw_mm: mean,
                    uncertainty: std,
                    method: PredictionMethod::SpatialInterpolation,
                })
            }
            SpatialBackend::InverseDistance => {
                let pw = self.settings.idw.estimate(&self.index, query).ok_or(
                    SpatialError::NotEnoughStations {
                        required: 1,
                        available: 0,
                    },
                )?;
                Ok(SpatialEstimate {
                    pw_mm: pw,
                    uncertainty: self.settings.idw_uncertainty,
                    method: PredictionMethod::InverseDistanceWeighting,
                })
            }
            SpatialBackend::Linear => Ok(SpatialEstimate {
                pw_mm: approximate_pw(lat, lon),
                uncertainty: self.settings.approximate_uncertainty,
                method: PredictionMethod::ApproximateInterpolation,
            }),
        }
    }
}

/// Linear last resort: `|lat|·0.1 + |lon|·0.01`.
pub fn approximate_pw(latitude: f64, longitude: f64) -> f64 {
    latitude.abs() * 0.1 + longitude.abs() * 0.01
}
