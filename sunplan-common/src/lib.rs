//! # Sunplan Common Library
//!
//! Shared code for the Sunplan analysis service and its callers:
//! - Boundary records (roof, location, recommendation outputs)
//! - Configuration loading and file resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
