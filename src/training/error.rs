use crate::features::error::FeatureError;
use crate::model::error::{ModelError, ResidualError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Failed to read dataset '{0}'")]
    DatasetRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse dataset '{0}' as a JSON array of observations")]
    DatasetParse(PathBuf, #[source] serde_json::Error),

    #[error("No usable observations: {total} rows, none passed the sanity filter")]
    NoUsableObservations { total: usize },

    #[error("Validation needs at least {required} stations, got {available}")]
    NotEnoughStations { required: usize, available: usize },

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Residual(#[from] ResidualError),
}
