//! Error types for schema construction, registry lookups and mock generation.
//!
//! These are configuration errors raised by the caller's collaborator (a
//! malformed constraint registry). Bad candidate data never produces one of
//! these: it is reported inside a [`crate::ValidationResult`] instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid pattern for field {path}: {message}")]
    InvalidPattern { path: String, message: String },

    #[error("Invalid bounds for field {path}: min {min} is greater than max {max}")]
    InvalidBounds { path: String, min: f64, max: f64 },

    #[error("Enumerated set for field {path} is empty")]
    EmptyChoices { path: String },

    #[error("Constraint #{index} has an empty field path")]
    EmptyPath { index: usize },

    #[error("Schema parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown schema: {name}")]
    UnknownSchema { name: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Error)]
pub enum MockError {
    #[error("Cannot synthesize field {path}: pattern {pattern} needs an example value")]
    MissingExample { path: String, pattern: String },
}
