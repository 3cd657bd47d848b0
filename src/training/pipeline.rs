//! Builds a [`ModelArtifact`] from a set of observations.
//!
//! Steps: sanity filter, physics PW, residual target, features, scaler, boosting,
//! station encoder, station table, and a Gaussian process over the station table
//! when the network is large enough.

use crate::features::engineer::{FeatureEngineer, DEFAULT_FEATURE_COLUMNS};
use crate::model::artifact::{ModelArtifact, ResidualBaseline};
use crate::model::boosting::{BoosterParams, GradientBoostedRegressor};
use crate::model::encoder::StationEncoder;
use crate::model::scaler::StandardScaler;
use crate::spatial::gaussian_process::{GaussianProcess, MIN_TRAINING_POINTS};
use crate::training::error::TrainingError;
use crate::types::observation::Observation;
use crate::types::station::StationLocation;
use bon::builder;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub booster: BoosterParams,
    pub feature_columns: Vec<String>,
    /// Fit the Gaussian process over station aggregates when enough stations exist.
    pub fit_spatial_model: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            booster: BoosterParams::default(),
            feature_columns: DEFAULT_FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            fit_spatial_model: true,
        }
    }
}

/// Reads a JSON array of observations.
pub fn load_dataset(path: &Path) -> Result<Vec<Observation>, TrainingError> {
    let bytes = std::fs::read(path).map_err(|e| TrainingError::DatasetRead(path.to_path_buf(), e))?;
    serde_json::from_slice(&bytes).map_err(|e| TrainingError::DatasetParse(path.to_path_buf(), e))
}

/// Keeps the rows inside the physical sanity window.
pub fn plausible(observations: &[Observation]) -> Vec<&Observation> {
    let kept: Vec<&Observation> = observations.iter().filter(|o| o.is_plausible()).collect();
    if kept.len() < observations.len() {
        info!(
            "Sanity filter dropped {} of {} observations",
            observations.len() - kept.len(),
            observations.len()
        );
    }
    kept
}

/// Reference PW of a row: the measured value when available, else the Bevis estimate.
pub fn reference_pw(observation: &Observation) -> f64 {
    observation
        .measured_pw_mm
        .filter(|pw| pw.is_finite())
        .unwrap_or_else(|| observation.physics_pw_mm())
}

/// Per-station aggregates: mean location and elevation, latest reference PW.
pub fn station_table(observations: &[&Observation]) -> Vec<StationLocation> {
    let mut grouped: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
    for o in observations {
        grouped.entry(o.station_id.as_str()).or_default().push(o);
    }
    grouped
        .into_iter()
        .filter_map(|(id, rows)| {
            let n = rows.len() as f64;
            let latest = rows.iter().max_by_key(|o| o.timestamp)?;
            Some(
                StationLocation::new(
                    id,
                    rows.iter().map(|o| o.latitude).sum::<f64>() / n,
                    rows.iter().map(|o| o.longitude).sum::<f64>() / n,
                )
                .with_elevation(rows.iter().map(|o| o.elevation).sum::<f64>() / n)
                .with_pw(reference_pw(latest)),
            )
        })
        .collect()
}

/// Fits the residual model on already-filtered rows.
///
/// With measured PW in the data the residual is measured minus Bevis PW for the
/// rows that have it; otherwise it is the physics PW minus its training mean.
pub(crate) fn fit_residual(
    rows: &[&Observation],
    config: &TrainingConfig,
    encoder: Option<&StationEncoder>,
) -> Result<(GradientBoostedRegressor, StandardScaler, ResidualBaseline), TrainingError> {
    let physics_mean = mean(rows.iter().map(|o| o.physics_pw_mm()));
    let measured: Vec<&Observation> = rows
        .iter()
        .copied()
        .filter(|o| o.measured_pw_mm.is_some_and(f64::is_finite))
        .collect();

    let (training_rows, targets, baseline): (Vec<&Observation>, Vec<f64>, ResidualBaseline) =
        if measured.is_empty() {
            let targets = rows.iter().map(|o| o.physics_pw_mm() - physics_mean).collect();
            (rows.to_vec(), targets, ResidualBaseline::Climatological { mean_mm: physics_mean })
        } else {
            let targets = measured
                .iter()
                .map(|o| reference_pw(o) - o.physics_pw_mm())
                .collect();
            (
                measured,
                targets,
                ResidualBaseline::Bevis {
                    fallback_mean_mm: physics_mean,
                },
            )
        };
    debug!("Residual baseline: {:?} over {} rows", baseline, training_rows.len());

    let mut x = Vec::with_capacity(training_rows.len());
    for o in &training_rows {
        let mut engineer = FeatureEngineer::at(o.timestamp);
        if let Some(encoder) = encoder {
            engineer = engineer.with_encoder(encoder);
        }
        x.push(engineer.vector(&o.to_record(), &config.feature_columns)?.values);
    }

    let scaler = StandardScaler::fit(&x)?;
    let scaled = scaler.transform_rows(&x)?;
    let model = GradientBoostedRegressor::fit(&scaled, &targets, &config.booster)?;
    Ok((model, scaler, baseline))
}

/// Trains a complete artifact.
///
/// # Errors
///
/// Returns [`TrainingError::NoUsableObservations`] when nothing passes the sanity
/// filter, and propagates feature and model errors.
///
/// # Examples
///
/// ```no_run
/// use vapourcast::training::pipeline::{load_dataset, train_artifact};
///
/// let observations = load_dataset("dataset.json".as_ref()).unwrap();
/// let artifact = train_artifact().observations(&observations).call().unwrap();
/// artifact.save("physics_informed_gbm.bin".as_ref()).unwrap();
/// ```
#[builder]
pub fn train_artifact(
    observations: &[Observation],
    #[builder(default)] config: TrainingConfig,
) -> Result<ModelArtifact, TrainingError> {
    let rows = plausible(observations);
    if rows.is_empty() {
        return Err(TrainingError::NoUsableObservations {
            total: observations.len(),
        });
    }

    let encoder = StationEncoder::fit(rows.iter().map(|o| o.station_id.as_str()));
    let (model, scaler, baseline) = fit_residual(&rows, &config, Some(&encoder))?;
    let stations = station_table(&rows);

    let spatial_model = if config.fit_spatial_model && stations.len() >= MIN_TRAINING_POINTS {
        let points: Vec<[f64; 2]> = stations.iter().map(|s| [s.longitude, s.latitude]).collect();
        let values: Vec<f64> = stations.iter().filter_map(|s| s.pw_mm).collect();
        match GaussianProcess::fit(&points, &values) {
            Ok(gp) => Some(gp),
            Err(e) => {
                warn!("Skipping spatial model: {}", e);
                None
            }
        }
    } else {
        None
    };

    info!(
        "Trained artifact on {} rows from {} stations ({} trees, spatial model: {})",
        rows.len(),
        stations.len(),
        model.n_trees(),
        spatial_model.is_some()
    );

    Ok(ModelArtifact {
        model,
        scaler,
        feature_columns: config.feature_columns,
        baseline,
        station_encoder: Some(encoder),
        spatial_model,
        station_locations: stations,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    /// Synthetic network: PW rises with temperature and falls with latitude.
    pub(crate) fn synthetic_observations(with_measured: bool) -> Vec<Observation> {
        let stations = [
            ("ALFA", 40.0, -105.0, 1600.0),
            ("BRAV", 41.0, -100.0, 900.0),
            ("CHAR", 38.0, -98.0, 400.0),
            ("DELT", 44.0, -103.0, 1100.0),
            ("ECHO", 36.0, -102.0, 1200.0),
        ];
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let mut rows = Vec::new();
        for (s, (id, lat, lon, elev)) in stations.iter().enumerate() {
            for h in 0..24 {
                let temperature = 5.0 + h as f64 + s as f64;
                let zwd = 0.05 + 0.004 * h as f64 + 0.01 * s as f64;
                let physics = crate::physics::bevis_pw_mm(zwd, temperature);
                rows.push(Observation {
                    station_id: id.to_string(),
                    latitude: *lat,
                    longitude: *lon,
                    elevation: *elev,
                    timestamp: start + Duration::hours(h),
                    zwd_m: zwd,
                    temperature_c: temperature,
                    pressure_hpa: 1010.0 - elev / 10.0,
                    humidity_pct: 40.0 + h as f64,
                    satellite_azimuth: None,
                    satellite_elevation: None,
                    measured_pw_mm: with_measured.then_some(physics + 1.5),
                });
            }
        }
        rows
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            booster: BoosterParams {
                n_estimators: 30,
                ..BoosterParams::default()
            },
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_trains_a_complete_artifact() {
        let observations = synthetic_observations(false);
        let artifact = train_artifact()
            .observations(&observations)
            .config(quick_config())
            .call()
            .unwrap();
        assert_eq!(artifact.feature_columns.len(), DEFAULT_FEATURE_COLUMNS.len());
        assert_eq!(artifact.station_locations.len(), 5);
        assert!(artifact.spatial_model.is_some());
        assert_eq!(artifact.station_encoder.as_ref().map(|e| e.len()), Some(5));
        assert!(matches!(artifact.baseline, ResidualBaseline::Climatological { .. }));
    }

    #[test]
    fn test_measured_pw_selects_bevis_baseline() {
        let observations = synthetic_observations(true);
        let artifact = train_artifact()
            .observations(&observations)
            .config(quick_config())
            .call()
            .unwrap();
        assert!(matches!(artifact.baseline, ResidualBaseline::Bevis { .. }));
    }

    #[test]
    fn test_station_table_uses_latest_pw() {
        let observations = synthetic_observations(true);
        let rows: Vec<&Observation> = observations.iter().collect();
        let table = station_table(&rows);
        let alfa = table.iter().find(|s| s.id == "ALFA").unwrap();
        let latest = observations.iter().filter(|o| o.station_id == "ALFA").last().unwrap();
        assert_eq!(alfa.pw_mm, latest.measured_pw_mm);
        assert_eq!(alfa.latitude, 40.0);
        assert_eq!(alfa.elevation, Some(1600.0));
    }

    #[test]
    fn test_sanity_filter_rejects_everything() {
        let mut observations = synthetic_observations(false);
        for o in &mut observations {
            o.pressure_hpa = 500.0;
        }
        let err = train_artifact().observations(&observations).call().unwrap_err();
        assert!(matches!(err, TrainingError::NoUsableObservations { total: 120 }));
    }

    #[test]
    fn test_dataset_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        let observations = synthetic_observations(false);
        std::fs::write(&path, serde_json::to_vec(&observations).unwrap()).unwrap();
        assert_eq!(load_dataset(&path).unwrap(), observations);
        assert!(matches!(
            load_dataset(&dir.path().join("missing.json")),
            Err(TrainingError::DatasetRead(..))
        ));
    }
}
