//! Utility functions for the picopayments tools

pub mod config;
pub mod env_var;
pub mod observability;

pub use env_var::*;
