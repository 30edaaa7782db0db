//! Domain layer for the Turnwise assessment engine
//!
//! This module contains core models, the error taxonomy and the port traits.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{AssessmentError, AssessmentResult, ErrorKind, JudgmentError, StoreError};
