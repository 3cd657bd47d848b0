//! Physics-informed residual prediction.
//!
//! The boosted model never predicts PW directly: it predicts the correction to a
//! physics baseline, and the final answer is `baseline + residual`, clipped at zero.

use crate::features::engineer::{layout, FeatureEngineer, FeatureVector};
use crate::model::artifact::ModelArtifact;
use crate::model::error::{ArtifactError, ResidualError};
use crate::physics;
use crate::types::observation::ObservationRecord;
use chrono::NaiveDateTime;
use log::warn;
use std::path::Path;
use std::sync::Arc;

/// One residual-model answer with its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualPrediction {
    pub pw_mm: f64,
    pub baseline_mm: f64,
    pub residual_mm: f64,
    pub features: FeatureVector,
}

/// Availability of the residual model.
#[derive(Debug, Clone, Default)]
pub enum ResidualPredictor {
    Trained(Arc<ModelArtifact>),
    #[default]
    Untrained,
}

impl ResidualPredictor {
    /// Loads the artifact at `path`, degrading to [`ResidualPredictor::Untrained`] on
    /// any failure. The error is returned alongside for reporting.
    pub fn load(path: &Path) -> (Self, Option<ArtifactError>) {
        match ModelArtifact::load(path) {
            Ok(artifact) => (ResidualPredictor::Trained(Arc::new(artifact)), None),
            Err(e) => {
                warn!("Residual model unavailable: {}", e);
                (ResidualPredictor::Untrained, Some(e))
            }
        }
    }

    pub fn is_trained(&self) -> bool {
        matches!(self, ResidualPredictor::Trained(_))
    }

    pub fn artifact(&self) -> Option<&Arc<ModelArtifact>> {
        match self {
            ResidualPredictor::Trained(artifact) => Some(artifact),
            ResidualPredictor::Untrained => None,
        }
    }

    /// Predicts PW for a record.
    ///
    /// `reference_time` pins "now" for records without date fields.
    pub fn predict(
        &self,
        record: &ObservationRecord,
        reference_time: Option<NaiveDateTime>,
    ) -> Result<ResidualPrediction, ResidualError> {
        let artifact = self.artifact().ok_or(ResidualError::Untrained)?;
        predict_with(artifact, record, reference_time)
    }
}

impl From<Option<Arc<ModelArtifact>>> for ResidualPredictor {
    fn from(artifact: Option<Arc<ModelArtifact>>) -> Self {
        artifact.map_or(ResidualPredictor::Untrained, ResidualPredictor::Trained)
    }
}

/// Runs the artifact on one record: engineer → layout → scale → boost → add baseline.
pub fn predict_with(
    artifact: &ModelArtifact,
    record: &ObservationRecord,
    reference_time: Option<NaiveDateTime>,
) -> Result<ResidualPrediction, ResidualError> {
    let mut engineer = match reference_time {
        Some(t) => FeatureEngineer::at(t),
        None => FeatureEngineer::new(),
    };
    if let Some(encoder) = &artifact.station_encoder {
        engineer = engineer.with_encoder(encoder);
    }
    let engineered = engineer.engineer(record)?;
    let features = layout(&engineered, &artifact.feature_columns);
    if !features.filled.is_empty() {
        warn!("Filled underivable feature columns: {}", features.filled.join(", "));
    }

    let scaled = artifact.scaler.transform(&features.values)?;
    let residual_mm = artifact.model.predict(&scaled)?;
    let baseline_mm = artifact.baseline.baseline_mm(&engineered);

    Ok(ResidualPrediction {
        pw_mm: physics::enforce_physical_pw(baseline_mm + residual_mm),
        baseline_mm,
        residual_mm,
        features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::artifact::tests::tiny_artifact;
    use crate::model::artifact::ResidualBaseline;
    use chrono::NaiveDate;

    fn reference() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_untrained_reports_untrained() {
        let err = ResidualPredictor::Untrained
            .predict(&ObservationRecord::default(), None)
            .unwrap_err();
        assert_eq!(err, ResidualError::Untrained);
    }

    #[test]
    fn test_prediction_is_baseline_plus_residual() {
        let predictor = ResidualPredictor::from(Some(Arc::new(tiny_artifact())));
        let record = ObservationRecord::from_pairs([("temperature", 18.0), ("pressure", 995.0)]);
        let p = predictor.predict(&record, Some(reference())).unwrap();
        assert_eq!(p.baseline_mm, 20.0);
        assert!((p.pw_mm - (p.baseline_mm + p.residual_mm)).abs() < 1e-12);
        // temp 18 sits in the upper class of the training data
        assert!(p.residual_mm > 0.0);
        assert_eq!(p.features.values, vec![18.0, 995.0]);
    }

    #[test]
    fn test_bevis_baseline_uses_zwd_when_present() {
        let mut artifact = tiny_artifact();
        artifact.baseline = ResidualBaseline::Bevis {
            fallback_mean_mm: 7.0,
        };
        let with_zwd = ObservationRecord::from_pairs([("temperature", 20.0), ("zwdObservation", 0.2)]);
        let p = predict_with(&artifact, &with_zwd, Some(reference())).unwrap();
        assert!((p.baseline_mm - 32.0).abs() < 1e-9);

        let without = ObservationRecord::from_pairs([("temperature", 20.0)]);
        let p = predict_with(&artifact, &without, Some(reference())).unwrap();
        assert_eq!(p.baseline_mm, 7.0);
    }

    #[test]
    fn test_negative_sum_is_clipped() {
        let mut artifact = tiny_artifact();
        artifact.baseline = ResidualBaseline::Climatological { mean_mm: 0.0 };
        let record = ObservationRecord::from_pairs([("temperature", 0.0), ("pressure", 1013.0)]);
        let p = predict_with(&artifact, &record, Some(reference())).unwrap();
        assert!(p.residual_mm < 0.0);
        assert_eq!(p.pw_mm, 0.0);
    }

    #[test]
    fn test_load_failure_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let (predictor, err) = ResidualPredictor::load(&dir.path().join("none.bin"));
        assert!(!predictor.is_trained());
        assert!(matches!(err, Some(ArtifactError::Read(..))));
    }
}
