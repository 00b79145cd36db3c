/// Validation errors
#[macro_use]
pub mod error;
