pub mod artifact;
pub mod boosting;
pub mod encoder;
pub mod error;
pub mod residual;
pub mod scaler;
