use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpatialError {
    #[error("Need at least {required} stations with a valid PW value, got {available}")]
    NotEnoughStations { required: usize, available: usize },

    #[error("{points} training points but {targets} target values")]
    LengthMismatch { points: usize, targets: usize },

    #[error("Kernel matrix is not positive definite for every candidate hyper-parameter")]
    NotPositiveDefinite,

    #[error("Spatial model state is corrupt: {0}")]
    Corrupt(String),
}
