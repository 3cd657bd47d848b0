pub mod cyclical;
pub mod engineer;
pub mod error;
