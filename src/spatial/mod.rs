pub mod error;
pub mod gaussian_process;
pub mod idw;
pub mod interpolator;
pub mod locate_station;
