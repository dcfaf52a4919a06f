//! Error types for the model crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building or navigating the project model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Property path '{path}' does not resolve: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Expected a mapping for {0}")]
    NotAMapping(String),

    #[error("Invalid resource type tables in {path}: {message}")]
    ResourceTypes { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}
