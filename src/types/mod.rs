pub mod observation;
pub mod prediction;
pub mod request;
pub mod station;
