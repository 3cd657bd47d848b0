use crate::features::error::FeatureError;
use crate::model::error::{ArtifactError, ModelError, ResidualError};
use crate::spatial::error::SpatialError;
use crate::training::error::TrainingError;
use crate::types::request::RequestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VapourcastError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Residual(#[from] ResidualError),

    #[error(transparent)]
    Spatial(#[from] SpatialError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error("Failed to determine the data directory for the model artifact")]
    DataDirResolution,
}
