use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Expected {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("Cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("Training set has {features} feature rows but {targets} targets")]
    LengthMismatch { features: usize, targets: usize },

    #[error("Row {row} has {actual} features, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Training data contains a non-finite value at row {0}")]
    NonFinite(usize),
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to read model artifact '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to write model artifact '{0}'")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode model artifact '{0}'")]
    Decode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to encode model artifact")]
    Encode(#[source] Box<bincode::error::EncodeError>),

    #[error("Failed to (de)serialize model artifact '{0}' as JSON")]
    Json(PathBuf, #[source] serde_json::Error),

    #[error("Model artifact is missing the '{0}' entry")]
    MissingEntry(&'static str),

    #[error("Model artifact is inconsistent: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResidualError {
    #[error("No trained residual model is loaded")]
    Untrained,

    #[error(transparent)]
    Feature(#[from] crate::features::error::FeatureError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
