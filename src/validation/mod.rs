pub mod loso;
pub mod metrics;
