use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeatureError {
    #[error("Field '{field}' is not numeric: {value}")]
    NonNumeric { field: String, value: String },

    #[error("No feature columns requested")]
    NoColumns,
}
