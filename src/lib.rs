//! Precipitable water estimation from GNSS zenith wet delay.
//!
//! The crate combines a closed-form physics baseline (Saastamoinen / Bevis), a
//! boosted residual model, and a spatial interpolator over station aggregates
//! behind a single [`Predictor`] that always answers, degrading tier by tier when
//! a model is missing or a request is incomplete.

mod error;
mod predictor;
mod utils;

pub mod features;
pub mod model;
pub mod physics;
pub mod spatial;
pub mod training;
pub mod types;
pub mod validation;

pub use error::VapourcastError;
pub use predictor::*;
pub use utils::{get_data_dir, resolve_model_path, MODEL_PATH_ENV};

pub use features::engineer::{FeatureEngineer, FeatureVector, DEFAULT_FEATURE_COLUMNS};
pub use model::artifact::{ModelArtifact, ResidualBaseline};
pub use model::boosting::BoosterParams;
pub use spatial::interpolator::{SpatialInterpolator, SpatialSettings};
pub use training::pipeline::{train_artifact, TrainingConfig};
pub use types::observation::{Observation, ObservationRecord};
pub use types::prediction::{ErrorResponse, PredictionMethod, PredictionResult};
pub use types::request::{PredictionRequest, RequestError};
pub use types::station::StationLocation;
pub use validation::loso::{LosoHarness, LosoReport};

pub use features::error::FeatureError;
pub use model::error::{ArtifactError, ModelError, ResidualError};
pub use spatial::error::SpatialError;
pub use training::error::TrainingError;
