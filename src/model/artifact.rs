//! The model artifact: everything a prediction process needs, in one file.
//!
//! On disk the artifact is a bundle of independently optional named entries, so a
//! bundle written by a partial training run still loads as far as it can. Loading
//! checks the required entries (`model`, `scaler`, `feature_columns`) and their
//! mutual consistency before handing out a [`ModelArtifact`].

use crate::features::engineer::EngineeredFeatures;
use crate::model::boosting::GradientBoostedRegressor;
use crate::model::encoder::StationEncoder;
use crate::model::error::ArtifactError;
use crate::model::scaler::StandardScaler;
use crate::spatial::gaussian_process::GaussianProcess;
use crate::types::station::StationLocation;
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default artifact file name inside the data directory.
pub const ARTIFACT_FILE_NAME: &str = "physics_informed_gbm.bin";

const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// What the boosted model's residual is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ResidualBaseline {
    /// Residual relative to the mean physics PW of the training set.
    Climatological { mean_mm: f64 },
    /// Residual relative to the per-observation Bevis PW. Requests without a ZWD use
    /// `fallback_mean_mm` in its place.
    Bevis { fallback_mean_mm: f64 },
}

impl ResidualBaseline {
    pub fn baseline_mm(&self, features: &EngineeredFeatures) -> f64 {
        match *self {
            ResidualBaseline::Climatological { mean_mm } => mean_mm,
            ResidualBaseline::Bevis { fallback_mean_mm } => {
                features.get("pw_physics").unwrap_or(fallback_mean_mm)
            }
        }
    }
}

/// A validated, loaded model artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub model: GradientBoostedRegressor,
    pub scaler: StandardScaler,
    pub feature_columns: Vec<String>,
    pub baseline: ResidualBaseline,
    pub station_encoder: Option<StationEncoder>,
    pub spatial_model: Option<GaussianProcess>,
    pub station_locations: Vec<StationLocation>,
}

/// The on-disk layout. Every entry is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub model: Option<GradientBoostedRegressor>,
    pub scaler: Option<StandardScaler>,
    pub feature_columns: Option<Vec<String>>,
    pub baseline: Option<ResidualBaseline>,
    pub station_encoder: Option<StationEncoder>,
    pub spatial_model: Option<GaussianProcess>,
    pub station_locations: Option<Vec<StationLocation>>,
}

enum Format {
    Bincode,
    Json,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Bincode,
        }
    }
}

impl ArtifactBundle {
    /// Reads a bundle; `.json` files are JSON, anything else bincode.
    pub fn read(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = std::fs::read(path).map_err(|e| ArtifactError::Read(path.to_path_buf(), e))?;
        match Format::of(path) {
            Format::Json => serde_json::from_slice(&bytes)
                .map_err(|e| ArtifactError::Json(path.to_path_buf(), e)),
            Format::Bincode => {
                let (bundle, _) = bincode::serde::decode_from_slice::<ArtifactBundle, _>(&bytes, BINCODE_CONFIG)
                    .map_err(|e| ArtifactError::Decode(path.to_path_buf(), Box::new(e)))?;
                Ok(bundle)
            }
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ArtifactError> {
        let bytes = match Format::of(path) {
            Format::Json => serde_json::to_vec_pretty(self)
                .map_err(|e| ArtifactError::Json(path.to_path_buf(), e))?,
            Format::Bincode => bincode::serde::encode_to_vec(self, BINCODE_CONFIG)
                .map_err(|e| ArtifactError::Encode(Box::new(e)))?,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ArtifactError::Write(parent.to_path_buf(), e))?;
        }
        std::fs::write(path, &bytes).map_err(|e| ArtifactError::Write(path.to_path_buf(), e))?;
        info!("Wrote model artifact ({} bytes) to {}", bytes.len(), path.display());
        Ok(())
    }
}

impl TryFrom<ArtifactBundle> for ModelArtifact {
    type Error = ArtifactError;

    fn try_from(bundle: ArtifactBundle) -> Result<Self, Self::Error> {
        let model = bundle.model.ok_or(ArtifactError::MissingEntry("model"))?;
        let scaler = bundle.scaler.ok_or(ArtifactError::MissingEntry("scaler"))?;
        let feature_columns = bundle
            .feature_columns
            .ok_or(ArtifactError::MissingEntry("feature_columns"))?;

        if feature_columns.is_empty() {
            return Err(ArtifactError::Inconsistent("feature_columns is empty".into()));
        }
        if scaler.n_features() != feature_columns.len() || model.n_features() != feature_columns.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "{} feature columns, scaler expects {}, model expects {}",
                feature_columns.len(),
                scaler.n_features(),
                model.n_features()
            )));
        }

        let baseline = bundle.baseline.unwrap_or_else(|| {
            warn!("Artifact has no residual baseline, treating model output as absolute PW");
            ResidualBaseline::Climatological { mean_mm: 0.0 }
        });

        Ok(Self {
            model,
            scaler,
            feature_columns,
            baseline,
            station_encoder: bundle.station_encoder,
            spatial_model: bundle.spatial_model,
            station_locations: bundle.station_locations.unwrap_or_default(),
        })
    }
}

impl From<&ModelArtifact> for ArtifactBundle {
    fn from(artifact: &ModelArtifact) -> Self {
        Self {
            model: Some(artifact.model.clone()),
            scaler: Some(artifact.scaler.clone()),
            feature_columns: Some(artifact.feature_columns.clone()),
            baseline: Some(artifact.baseline),
            station_encoder: artifact.station_encoder.clone(),
            spatial_model: artifact.spatial_model.clone(),
            station_locations: Some(artifact.station_locations.clone()),
        }
    }
}

impl ModelArtifact {
    /// Loads and validates an artifact.
    ///
    /// # Errors
    ///
    /// * [`ArtifactError::Read`] if the file cannot be read.
    /// * [`ArtifactError::Decode`] / [`ArtifactError::Json`] if it is corrupt.
    /// * [`ArtifactError::MissingEntry`] if a required entry is absent.
    /// * [`ArtifactError::Inconsistent`] if the entries disagree on the feature count.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let artifact = Self::try_from(ArtifactBundle::read(path)?)?;
        info!(
            "Loaded model artifact from {} ({} features, {} trees, {} stations, spatial model: {})",
            path.display(),
            artifact.feature_columns.len(),
            artifact.model.n_trees(),
            artifact.station_locations.len(),
            artifact.spatial_model.is_some()
        );
        Ok(artifact)
    }

    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        ArtifactBundle::from(self).write(path)
    }
}
