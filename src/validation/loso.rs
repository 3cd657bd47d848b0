//! Leave-one-station-out comparison of the three PW strategies.
//!
//! For every station the harness trains on all other stations and scores on the
//! held-out one. This measures how well each strategy generalizes to a location it
//! has never seen, which is the question a sparse sensor network has to answer.

use crate::features::engineer::DEFAULT_FEATURE_COLUMNS;
use crate::model::artifact::ModelArtifact;
use crate::model::boosting::BoosterParams;
use crate::model::encoder::StationEncoder;
use crate::model::residual::predict_with;
use crate::physics::enforce_physical_pw;
use crate::predictor::LatLon;
use crate::spatial::idw::{weighted_mean, NeighbourLimit};
use crate::spatial::locate_station::StationIndex;
use crate::training::error::TrainingError;
use crate::training::pipeline::{fit_residual, plausible, reference_pw, TrainingConfig};
use crate::types::observation::Observation;
use crate::types::station::StationLocation;
use crate::validation::metrics::{mae, r2_floored, rmse};
use bon::bon;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strategy {
    /// Training-set mean of the reference PW.
    PhysicsOnly,
    /// IDW over per-station mean PW of the training stations.
    SpatialIdw,
    /// Physics baseline plus boosted residual.
    PhysicsInformedMl,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::PhysicsOnly,
        Strategy::SpatialIdw,
        Strategy::PhysicsInformedMl,
    ];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::PhysicsOnly => "Physics-Only",
            Strategy::SpatialIdw => "Spatial IDW",
            Strategy::PhysicsInformedMl => "Physics-Informed ML",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StrategyScore {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl StrategyScore {
    fn of(truth: &[f64], predicted: &[f64]) -> Self {
        Self {
            rmse: rmse(truth, predicted),
            mae: mae(truth, predicted),
            r2: r2_floored(truth, predicted),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationScores {
    pub station_id: String,
    pub n_observations: usize,
    pub scores: BTreeMap<Strategy, StrategyScore>,
}

impl StationScores {
    pub fn score(&self, strategy: Strategy) -> Option<StrategyScore> {
        self.scores.get(&strategy).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LosoReport {
    pub stations: Vec<StationScores>,
}

impl LosoReport {
    /// Unweighted mean over held-out stations.
    pub fn mean(&self, strategy: Strategy) -> StrategyScore {
        let scores: Vec<StrategyScore> = self.stations.iter().filter_map(|s| s.score(strategy)).collect();
        if scores.is_empty() {
            return StrategyScore {
                rmse: f64::NAN,
                mae: f64::NAN,
                r2: 0.0,
            };
        }
        let n = scores.len() as f64;
        StrategyScore {
            rmse: scores.iter().map(|s| s.rmse).sum::<f64>() / n,
            mae: scores.iter().map(|s| s.mae).sum::<f64>() / n,
            r2: scores.iter().map(|s| s.r2).sum::<f64>() / n,
        }
    }
}

impl fmt::Display for LosoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<20} {:>10} {:>10} {:>8}", "Model", "RMSE (mm)", "MAE (mm)", "R²")?;
        for strategy in Strategy::ALL {
            let s = self.mean(strategy);
            writeln!(f, "{:<20} {:>10.4} {:>10.4} {:>8.4}", strategy, s.rmse, s.mae, s.r2)?;
        }
        Ok(())
    }
}

/// Runs the leave-one-station-out comparison.
#[derive(Debug, Clone)]
pub struct LosoHarness {
    config: TrainingConfig,
    idw_power: f64,
}

#[bon]
impl LosoHarness {
    /// # Arguments
    ///
    /// * `booster` - Boosting parameters for each fold. Defaults to
    ///   [`BoosterParams::cross_validation`].
    /// * `feature_columns` - Model columns. Defaults to the deployed layout.
    /// * `idw_power` - Distance exponent of the IDW strategy (default 2).
    #[builder]
    pub fn new(
        booster: Option<BoosterParams>,
        feature_columns: Option<Vec<String>>,
        #[builder(default = 2.0)] idw_power: f64,
    ) -> Self {
        Self {
            config: TrainingConfig {
                booster: booster.unwrap_or_else(BoosterParams::cross_validation),
                feature_columns: feature_columns
                    .unwrap_or_else(|| DEFAULT_FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()),
                fit_spatial_model: false,
            },
            idw_power,
        }
    }
}

impl Default for LosoHarness {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl LosoHarness {
    /// # Errors
    ///
    /// * [`TrainingError::NoUsableObservations`] if nothing passes the sanity filter.
    /// * [`TrainingError::NotEnoughStations`] with fewer than two stations.
    /// * Feature and model errors from the per-fold fits.
    pub fn run(&self, observations: &[Observation]) -> Result<LosoReport, TrainingError> {
        let rows = plausible(observations);
        if rows.is_empty() {
            return Err(TrainingError::NoUsableObservations {
                total: observations.len(),
            });
        }
        let mut by_station: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
        for o in &rows {
            by_station.entry(o.station_id.as_str()).or_default().push(o);
        }
        if by_station.len() < 2 {
            return Err(TrainingError::NotEnoughStations {
                required: 2,
                available: by_station.len(),
            });
        }

        let mut report = LosoReport::default();
        for (station_id, test) in &by_station {
            let train: Vec<&Observation> = rows
                .iter()
                .copied()
                .filter(|o| o.station_id != *station_id)
                .collect();
            let scores = self.score_fold(&train, test)?;
            debug!("LOSO fold {}: {:?}", station_id, scores);
            report.stations.push(StationScores {
                station_id: station_id.to_string(),
                n_observations: test.len(),
                scores,
            });
        }
        info!("LOSO finished over {} stations", report.stations.len());
        Ok(report)
    }

    fn score_fold(
        &self,
        train: &[&Observation],
        test: &[&Observation],
    ) -> Result<BTreeMap<Strategy, StrategyScore>, TrainingError> {
        let truth: Vec<f64> = test.iter().map(|o| reference_pw(o)).collect();
        let mut scores = BTreeMap::new();

        let train_mean = train.iter().map(|o| reference_pw(o)).sum::<f64>() / train.len() as f64;
        let physics_only = vec![enforce_physical_pw(train_mean); test.len()];
        scores.insert(Strategy::PhysicsOnly, StrategyScore::of(&truth, &physics_only));

        let table = station_means(train);
        let idw: Vec<f64> = test
            .iter()
            .map(|o| {
                let pw = weighted_mean(&table, LatLon(o.latitude, o.longitude), self.idw_power);
                enforce_physical_pw(pw.unwrap_or(train_mean))
            })
            .collect();
        scores.insert(Strategy::SpatialIdw, StrategyScore::of(&truth, &idw));

        // The held-out truth never reaches the model: only its inputs do.
        let encoder = StationEncoder::fit(train.iter().map(|o| o.station_id.as_str()));
        let (model, scaler, baseline) = fit_residual(train, &self.config, Some(&encoder))?;
        let artifact = ModelArtifact {
            model,
            scaler,
            feature_columns: self.config.feature_columns.clone(),
            baseline,
            station_encoder: Some(encoder),
            spatial_model: None,
            station_locations: Vec::new(),
        };
        let ml = test
            .iter()
            .map(|o| predict_with(&artifact, &o.to_record(), Some(o.timestamp)).map(|p| p.pw_mm))
            .collect::<Result<Vec<f64>, _>>()?;
        scores.insert(Strategy::PhysicsInformedMl, StrategyScore::of(&truth, &ml));

        Ok(scores)
    }
}

/// Per-station mean location and mean reference PW.
fn station_means(rows: &[&Observation]) -> Vec<StationLocation> {
    let mut grouped: BTreeMap<&str, (f64, f64, f64, usize)> = BTreeMap::new();
    for o in rows {
        let e = grouped.entry(o.station_id.as_str()).or_insert((0.0, 0.0, 0.0, 0));
        e.0 += o.latitude;
        e.1 += o.longitude;
        e.2 += reference_pw(o);
        e.3 += 1;
    }
    grouped
        .into_iter()
        .map(|(id, (lat, lon, pw, n))| {
            let n = n as f64;
            StationLocation::new(id, lat / n, lon / n).with_pw(pw / n)
        })
        .collect()
}

/// Result of interpolating one station from its nearest neighbours.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighbourInterpolation {
    pub target_id: String,
    pub true_pw: f64,
    /// `(station id, great-circle distance in km, PW)` closest first.
    pub neighbours: Vec<(String, f64, f64)>,
    pub interpolated_pw: f64,
}

impl NeighbourInterpolation {
    pub fn absolute_error(&self) -> f64 {
        (self.interpolated_pw - self.true_pw).abs()
    }
}

impl fmt::Display for NeighbourInterpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Target station: {}", self.target_id)?;
        writeln!(f, "True PW: {:.3} mm", self.true_pw)?;
        for (id, distance_km, pw) in &self.neighbours {
            writeln!(f, "Station {} | Dist={:.1} km | PW={:.3}", id, distance_km, pw)?;
        }
        writeln!(f, "Interpolated PW: {:.3} mm", self.interpolated_pw)?;
        writeln!(f, "Absolute error: {:.3} mm", self.absolute_error())
    }
}

/// Interpolates `target_id` from the stations selected by `limit`, with weights
/// `1 / d` (`d` in degrees). Station values are mean reference PW.
///
/// Returns `None` if the target is unknown or no other station is within range.
pub fn nearest_station_interpolation(
    observations: &[Observation],
    target_id: &str,
    limit: NeighbourLimit,
) -> Option<NeighbourInterpolation> {
    let rows = plausible(observations);
    let (targets, others): (Vec<StationLocation>, Vec<StationLocation>) = station_means(&rows)
        .into_iter()
        .partition(|s| s.id == target_id);
    let target = targets.into_iter().next()?;
    let true_pw = target.pw_mm?;

    let index = StationIndex::new(others);
    let nearest = index.query_with_pw(target.latitude, target.longitude, limit.count, limit.max_distance_km);
    let query = LatLon(target.latitude, target.longitude);
    let interpolated = weighted_mean(nearest.iter().map(|(s, _)| s), query, 1.0)?;

    Some(NeighbourInterpolation {
        target_id: target.id,
        true_pw,
        neighbours: nearest
            .into_iter()
            .filter_map(|(s, d)| s.pw_mm.map(|pw| (s.id, d, pw)))
            .collect(),
        interpolated_pw: enforce_physical_pw(interpolated),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::pipeline::tests::synthetic_observations;

    fn quick_harness() -> LosoHarness {
        LosoHarness::builder()
            .booster(BoosterParams {
                n_estimators: 20,
                ..BoosterParams::cross_validation()
            })
            .build()
    }

    #[test]
    fn test_report_covers_every_station_and_strategy() {
        let report = quick_harness().run(&synthetic_observations(false)).unwrap();
        assert_eq!(report.stations.len(), 5);
        for station in &report.stations {
            assert_eq!(station.n_observations, 24);
            for strategy in Strategy::ALL {
                let s = station.score(strategy).unwrap();
                assert!(s.rmse >= 0.0 && s.mae >= 0.0);
                assert!((0.0..=1.0).contains(&s.r2));
            }
        }
        let table = report.to_string();
        assert!(table.contains("Physics-Only"));
        assert!(table.contains("Spatial IDW"));
        assert!(table.contains("Physics-Informed ML"));
    }

    #[test]
    fn test_bevis_baseline_beats_climatology_with_measured_pw() {
        // measured PW is exactly Bevis + 1.5, so the residual model only has to learn a constant
        let report = quick_harness().run(&synthetic_observations(true)).unwrap();
        let ml = report.mean(Strategy::PhysicsInformedMl);
        let physics_only = report.mean(Strategy::PhysicsOnly);
        assert!(ml.rmse < physics_only.rmse);
        assert!(ml.rmse < 0.1, "ml rmse was {}", ml.rmse);
    }

    #[test]
    fn test_requires_two_stations() {
        let single: Vec<Observation> = synthetic_observations(false)
            .into_iter()
            .filter(|o| o.station_id == "ALFA")
            .collect();
        assert!(matches!(
            LosoHarness::default().run(&single),
            Err(TrainingError::NotEnoughStations {
                required: 2,
                available: 1
            })
        ));
    }

    #[test]
    fn test_nearest_station_interpolation() {
        let observations = synthetic_observations(false);
        let limit = NeighbourLimit {
            count: 3,
            max_distance_km: f64::INFINITY,
        };
        let demo = nearest_station_interpolation(&observations, "ALFA", limit).unwrap();
        assert_eq!(demo.neighbours.len(), 3);
        assert!(demo.neighbours.windows(2).all(|w| w[0].1 <= w[1].1));
        assert!(demo.neighbours.iter().all(|(id, _, _)| id != "ALFA"));
        let min = demo.neighbours.iter().map(|n| n.2).fold(f64::INFINITY, f64::min);
        let max = demo.neighbours.iter().map(|n| n.2).fold(f64::NEG_INFINITY, f64::max);
        assert!(demo.interpolated_pw >= min && demo.interpolated_pw <= max);
        assert!(demo.to_string().contains("Target station: ALFA"));
        assert!(nearest_station_interpolation(&observations, "NOPE", limit).is_none());
    }

    #[test]
    fn test_neighbour_radius_limits_interpolation() {
        let observations = synthetic_observations(false);
        // BRAV is ~440 km and DELT ~475 km from ALFA, ECHO and CHAR are further
        let limit = NeighbourLimit {
            count: 5,
            max_distance_km: 500.0,
        };
        let demo = nearest_station_interpolation(&observations, "ALFA", limit).unwrap();
        let ids: Vec<&str> = demo.neighbours.iter().map(|(id, _, _)| id.as_str()).collect();
        assert_eq!(ids, ["BRAV", "DELT"]);
        assert!(demo.neighbours.iter().all(|(_, d, _)| *d <= 500.0));

        let too_tight = NeighbourLimit {
            count: 5,
            max_distance_km: 100.0,
        };
        assert!(nearest_station_interpolation(&observations, "ALFA", too_tight).is_none());
    }
}
