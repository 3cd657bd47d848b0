//! The prediction orchestrator: the main entry point of the crate.
//!
//! A [`Predictor`] owns an optional model artifact and answers
//! [`PredictionRequest`]s. Every request gets an answer: when a tier fails, the next
//! lower-fidelity tier takes over and the response's `method` says which one ran.
//!
//! Feature requests: physics-informed residual model → Bevis physics baseline →
//! coordinate fallback formula → constant ZWD conversion.
//!
//! Coordinate requests: spatial interpolator built from the artifact (Gaussian
//! process, IDW or linear approximation) → coordinate fallback formula.

use crate::model::artifact::ModelArtifact;
use crate::model::error::ResidualError;
use crate::model::residual::ResidualPredictor;
use crate::physics;
use crate::spatial::interpolator::{SpatialInterpolator, SpatialSettings};
use crate::types::observation::{field, ObservationRecord};
use crate::types::prediction::{PredictionMethod, PredictionResult};
use crate::types::request::{PredictionRequest, RequestError};
use bon::bon;
use chrono::NaiveDateTime;
use log::{debug, warn};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
///
/// # Examples
///
/// ```
/// use vapourcast::LatLon;
///
/// let boulder = LatLon(40.0127, -105.2535);
/// assert_eq!(boulder.0, 40.0127); // Latitude
/// assert_eq!(boulder.1, -105.2535); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

/// Tunable constants of the prediction chain.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorConfig {
    /// Uncertainty of a residual-model answer for a request carrying station identity.
    pub feature_uncertainty: f64,
    /// Uncertainty of a residual-model answer for a request without station identity.
    pub anonymous_feature_uncertainty: f64,
    pub physics_baseline_uncertainty: f64,
    pub fallback_formula_uncertainty: f64,
    pub fallback_conversion_uncertainty: f64,
    /// ZWD assumed by the constant conversion when the request has none.
    pub default_zwd: f64,
    /// Largest ZWD (meters) the Bevis tier accepts; larger values skip to the next tier.
    pub max_baseline_zwd_m: f64,
    /// Coordinate answers are scaled by `1 + |lat| / 90 · latitude_uncertainty_scale`.
    pub latitude_uncertainty_scale: f64,
    pub spatial: SpatialSettings,
    /// Fixed "now" for requests without date fields. `None` reads the wall clock.
    pub reference_time: Option<NaiveDateTime>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            feature_uncertainty: 0.08,
            anonymous_feature_uncertainty: 0.25,
            physics_baseline_uncertainty: 0.12,
            fallback_formula_uncertainty: 0.3,
            fallback_conversion_uncertainty: 0.15,
            default_zwd: 15.0,
            max_baseline_zwd_m: 1.0,
            latitude_uncertainty_scale: 0.5,
            spatial: SpatialSettings::default(),
            reference_time: None,
        }
    }
}

const NO_MODEL_NOTE: &str = "Model not available";

/// Answers prediction requests.
///
/// Immutable after construction; share one instance across threads behind an
/// `Arc` or by reference.
///
/// # Examples
///
/// ```
/// use vapourcast::{PredictionMethod, Predictor};
/// use serde_json::json;
///
/// let predictor = Predictor::builder().build();
/// let result = predictor.predict_json(json!({"zwdObservation": 15})).unwrap();
/// assert_eq!(result.predicted_pw, 2.4);
/// assert_eq!(result.method, PredictionMethod::FallbackConversion);
/// ```
#[derive(Debug, Clone)]
pub struct Predictor {
    residual: ResidualPredictor,
    spatial: Option<SpatialInterpolator>,
    config: PredictorConfig,
}

#[bon]
impl Predictor {
    /// Creates a predictor.
    ///
    /// # Arguments
    ///
    /// * `artifact` - The loaded model artifact, if any. Without one every request
    ///   is answered by the fallback formulas.
    /// * `config` - Tunables; defaults to [`PredictorConfig::default`].
    #[builder]
    pub fn new(artifact: Option<Arc<ModelArtifact>>, config: Option<PredictorConfig>) -> Self {
        let config = config.unwrap_or_default();
        let spatial = artifact.as_ref().map(|a| {
            SpatialInterpolator::from_parts(
                a.spatial_model.clone(),
                a.station_locations.clone(),
                config.spatial,
            )
        });
        Self {
            residual: ResidualPredictor::from(artifact),
            spatial,
            config,
        }
    }
}

impl Predictor {
    /// Loads the artifact at `path` and builds a predictor around it.
    ///
    /// A missing or corrupt artifact is not an error: the predictor degrades to the
    /// fallback tiers and the failure is logged.
    pub fn from_model_path(path: &Path, config: Option<PredictorConfig>) -> Self {
        let (residual, _) = ResidualPredictor::load(path);
        Self::builder()
            .maybe_artifact(residual.artifact().cloned())
            .maybe_config(config)
            .build()
    }

    pub fn has_model(&self) -> bool {
        self.residual.is_trained()
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Classifies and answers a JSON request.
    ///
    /// # Errors
    ///
    /// Only an unrecognizable request shape is an error; see [`PredictionRequest::from_json`].
    pub fn predict_json(&self, value: Value) -> Result<PredictionResult, RequestError> {
        Ok(self.predict(&PredictionRequest::from_json(value)?))
    }

    /// Answers a classified request. Never fails.
    pub fn predict(&self, request: &PredictionRequest) -> PredictionResult {
        match request {
            PredictionRequest::Coordinate(location) => self.predict_coordinates(*location),
            PredictionRequest::Features(record) => self.predict_features(record),
        }
    }

    fn predict_coordinates(&self, location: LatLon) -> PredictionResult {
        let LatLon(lat, lon) = location;
        let Some(spatial) = &self.spatial else {
            debug!("No artifact loaded, answering ({}, {}) with the fallback formula", lat, lon);
            return self
                .fallback_formula(lat, lon)
                .with_note(format!("{}, using fallback formula", NO_MODEL_NOTE))
                .at(lat, lon);
        };

        match spatial.estimate(location) {
            Ok(estimate) => {
                let factor = 1.0 + lat.abs() / 90.0 * self.config.latitude_uncertainty_scale;
                let result = PredictionResult::new(estimate.pw_mm, estimate.uncertainty * factor, estimate.method);
                let result = match estimate.method {
                    PredictionMethod::ApproximateInterpolation => {
                        result.with_note("No spatial model available, using approximate calculation")
                    }
                    PredictionMethod::SpatialExtrapolation => {
                        result.with_note("Far outside the station network, using the regional mean")
                    }
                    _ => result,
                };
                result.at(lat, lon)
            }
            Err(e) => {
                warn!("Spatial interpolation failed at ({}, {}): {}", lat, lon, e);
                self.fallback_formula(lat, lon).with_error(e).at(lat, lon)
            }
        }
    }

    fn predict_features(&self, record: &ObservationRecord) -> PredictionResult {
        match self.residual.predict(record, self.config.reference_time) {
            Ok(prediction) => {
                let uncertainty = if record.has_any(field::STATION_IDENTITY) {
                    self.config.feature_uncertainty
                } else {
                    self.config.anonymous_feature_uncertainty
                };
                debug!(
                    "Residual model: baseline {:.3} + residual {:.3}",
                    prediction.baseline_mm, prediction.residual_mm
                );
                PredictionResult::new(prediction.pw_mm, uncertainty, PredictionMethod::PhysicsInformedPrediction)
            }
            Err(ResidualError::Untrained) => {
                debug!("No residual model loaded, degrading");
                self.degraded_feature_prediction(record, None)
            }
            Err(e) => {
                warn!("Residual prediction failed, degrading: {}", e);
                self.degraded_feature_prediction(record, Some(e))
            }
        }
    }

    /// Tiers below the residual model, for feature requests.
    fn degraded_feature_prediction(&self, record: &ObservationRecord, cause: Option<ResidualError>) -> PredictionResult {
        let attach = |result: PredictionResult, note: &str| match &cause {
            Some(e) => result.with_note(note).with_error(e),
            None => result.with_note(format!("{}, {}", NO_MODEL_NOTE, note)),
        };

        let zwd = record.number(field::ZWD);
        let temperature = record.number(field::TEMPERATURE);
        if let (Ok(Some(zwd)), Ok(Some(temperature))) = (&zwd, &temperature) {
            if *zwd > 0.0 && *zwd <= self.config.max_baseline_zwd_m {
                let pw = physics::bevis_pw_mm(*zwd, *temperature);
                let result = PredictionResult::new(
                    pw,
                    self.config.physics_baseline_uncertainty,
                    PredictionMethod::PhysicsBaseline,
                );
                return attach(result, "using the Bevis conversion of the observed ZWD");
            }
            debug!("ZWD {} outside the Bevis tier range, skipping it", zwd);
        }

        // Station coordinates alone do not select the formula.
        if let (Some(lat), Some(lon)) = (
            record.number_lenient(field::COORDINATE_LATITUDE),
            record.number_lenient(field::COORDINATE_LONGITUDE),
        ) {
            return attach(self.fallback_formula(lat, lon), "using fallback formula");
        }

        let zwd = record.number_lenient(field::ZWD).unwrap_or(self.config.default_zwd);
        let result = PredictionResult::new(
            physics::fallback_conversion_pw(zwd),
            self.config.fallback_conversion_uncertainty,
            PredictionMethod::FallbackConversion,
        );
        attach(result, "using ZWD * 0.16 conversion")
    }

    fn fallback_formula(&self, lat: f64, lon: f64) -> PredictionResult {
        PredictionResult::new(
            fallback_formula_pw(lat, lon),
            self.config.fallback_formula_uncertainty,
            PredictionMethod::FallbackFormula,
        )
    }
}

/// Coordinate formula used without a usable model: `|lat|·0.05 + |lon|·0.005 + 1.5`.
pub fn fallback_formula_pw(latitude: f64, longitude: f64) -> f64 {
    latitude.abs() * 0.05 + longitude.abs() * 0.005 + 1.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::artifact::tests::tiny_artifact;
    use crate::training::pipeline::tests::synthetic_observations;
    use crate::training::pipeline::{train_artifact, TrainingConfig};
    use crate::model::boosting::BoosterParams;
    use chrono::NaiveDate;
    use serde_json::json;

    fn no_model() -> Predictor {
        Predictor::builder().build()
    }

    fn trained() -> Predictor {
        let observations = synthetic_observations(false);
        let artifact = train_artifact()
            .observations(&observations)
            .config(TrainingConfig {
                booster: BoosterParams {
                    n_estimators: 20,
                    ..BoosterParams::default()
                },
                ..TrainingConfig::default()
            })
            .call()
            .unwrap();
        Predictor::builder()
            .artifact(Arc::new(artifact))
            .config(PredictorConfig {
                reference_time: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(12, 0, 0),
                ..PredictorConfig::default()
            })
            .build()
    }

    #[test]
    fn test_zwd_only_without_model_is_fallback_conversion() {
        let r = no_model().predict_json(json!({"zwdObservation": 15})).unwrap();
        assert_eq!(r.predicted_pw, 2.4);
        assert_eq!(r.uncertainty, 0.15);
        assert_eq!(r.method, PredictionMethod::FallbackConversion);
        assert!(r.error.is_none());
    }

    #[test]
    fn test_coordinates_without_model_are_fallback_formula() {
        let r = no_model()
            .predict_json(json!({"latitude": 40.0127, "longitude": -105.2535}))
            .unwrap();
        assert_eq!(r.method, PredictionMethod::FallbackFormula);
        // 40.0127 * 0.05 + 105.2535 * 0.005 + 1.5
        assert_eq!(r.predicted_pw, 4.0269);
        assert_eq!(r.uncertainty, 0.3);
        assert_eq!(r.latitude, Some(40.0127));
        assert_eq!(r.longitude, Some(-105.2535));
    }

    #[test]
    fn test_physics_baseline_needs_zwd_and_temperature() {
        let p = no_model();
        let r = p.predict_json(json!({"zwdObservation": 0.2, "temperature": 20})).unwrap();
        assert_eq!(r.method, PredictionMethod::PhysicsBaseline);
        assert_eq!(r.predicted_pw, 32.0);

        // a ZWD far outside the meter range skips the Bevis tier
        let r = p.predict_json(json!({"zwdObservation": 15, "temperature": 20})).unwrap();
        assert_eq!(r.method, PredictionMethod::FallbackConversion);
    }

    #[test]
    fn test_feature_request_with_plain_coordinates_uses_formula() {
        let r = no_model()
            .predict_json(json!({"latitude": -30.0, "longitude": 20.0, "year": 2024}))
            .unwrap();
        assert_eq!(r.method, PredictionMethod::FallbackFormula);
        assert_eq!(r.predicted_pw, 3.1);
        assert!(r.latitude.is_none());
    }

    #[test]
    fn test_station_coordinates_without_model_use_zwd_conversion() {
        let r = no_model()
            .predict_json(json!({
                "stationId": "P041",
                "stationLatitude": 40,
                "stationLongitude": -105,
                "zwdObservation": 15,
                "year": 2024, "month": 5, "day": 1, "hour": 12
            }))
            .unwrap();
        assert_eq!(r.method, PredictionMethod::FallbackConversion);
        assert_eq!(r.predicted_pw, 2.4);

        let r = no_model()
            .predict_json(json!({"stationLatitude": -30.0, "stationLongitude": 20.0}))
            .unwrap();
        assert_eq!(r.method, PredictionMethod::FallbackConversion);
        assert_eq!(r.predicted_pw, 2.4);
    }

    #[test]
    fn test_non_numeric_field_falls_back() {
        let p = Predictor::builder().artifact(Arc::new(tiny_artifact())).build();
        let r = p
            .predict_json(json!({"temperature": "warm", "zwdObservation": 15}))
            .unwrap();
        assert_eq!(r.method, PredictionMethod::FallbackConversion);
        assert_eq!(r.predicted_pw, 2.4);
        assert!(r.error.is_some());
    }

    #[test]
    fn test_unsupported_shape_is_the_only_error() {
        assert_eq!(
            no_model().predict_json(json!({"foo": "bar"})),
            Err(RequestError::UnsupportedShape)
        );
    }

    #[test]
    fn test_non_negative_for_every_latitude() {
        for predictor in [no_model(), trained()] {
            for lat in (-90..=90).step_by(5) {
                for lon in [-180.0, -105.0, 0.0, 45.0, 180.0] {
                    let r = predictor.predict(&PredictionRequest::Coordinate(LatLon(lat as f64, lon)));
                    assert!(r.predicted_pw >= 0.0, "negative PW at ({}, {})", lat, lon);
                    assert!(r.uncertainty >= 0.0, "negative uncertainty at ({}, {})", lat, lon);
                    assert_eq!(r.predicted_pw, crate::types::prediction::round4(r.predicted_pw));
                }
            }
        }
    }

    #[test]
    fn test_trained_feature_request() {
        let p = trained();
        assert!(p.has_model());
        let with_identity = p
            .predict_json(json!({
                "stationId": "ALFA",
                "stationLatitude": 40.0,
                "stationLongitude": -105.0,
                "temperature": 15.0,
                "zwdObservation": 0.1
            }))
            .unwrap();
        assert_eq!(with_identity.method, PredictionMethod::PhysicsInformedPrediction);
        assert_eq!(with_identity.uncertainty, 0.08);
        assert!(with_identity.predicted_pw > 0.0);

        let anonymous = p.predict_json(json!({"temperature": 15.0})).unwrap();
        assert_eq!(anonymous.uncertainty, 0.25);
    }

    #[test]
    fn test_trained_coordinate_request_uses_spatial_model() {
        let p = trained();
        let r = p.predict_json(json!({"latitude": 40.0, "longitude": -102.0})).unwrap();
        assert!(matches!(
            r.method,
            PredictionMethod::SpatialInterpolation | PredictionMethod::SpatialExtrapolation
        ));
        assert_eq!(r.latitude, Some(40.0));
    }

    #[test]
    fn test_artifact_without_spatial_data_uses_approximation() {
        let mut artifact = tiny_artifact();
        artifact.station_locations.clear();
        let p = Predictor::builder().artifact(Arc::new(artifact)).build();
        let r = p.predict_json(json!({"latitude": 10.0, "longitude": 100.0})).unwrap();
        assert_eq!(r.method, PredictionMethod::ApproximateInterpolation);
        assert_eq!(r.predicted_pw, 2.0);
        // 0.35 scaled by 1 + 10/90 * 0.5
        assert_eq!(r.uncertainty, 0.3694);
    }

    #[test]
    fn test_missing_model_file_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let p = Predictor::from_model_path(&dir.path().join("missing.bin"), None);
        assert!(!p.has_model());
        let r = p.predict_json(json!({"latitude": 0.0, "longitude": 0.0})).unwrap();
        assert_eq!(r.method, PredictionMethod::FallbackFormula);
        assert_eq!(r.predicted_pw, 1.5);
    }

    #[test]
    fn test_predictor_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Predictor>();
    }
}
