//! Error types for IaC backends.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for IaC operations.
pub type IacResult<T> = Result<T, IacError>;

/// Errors that can occur while reading, writing or packaging a project.
#[derive(Error, Debug)]
pub enum IacError {
    #[error("Failed to parse project at {path}: {message}")]
    ProjectParse { path: PathBuf, message: String },

    #[error("No recognized project found in {0}")]
    NoProjectDetected(PathBuf),

    #[error("Property path '{path}' does not resolve in '{item}'")]
    InvalidTemplateReference { item: String, path: String },

    #[error("Failed to write {path}: {message}")]
    WriteFailure { path: PathBuf, message: String },

    #[error("Invalid project: {0}")]
    InvalidProject(String),

    #[error("{0}")]
    InvalidContext(String),

    #[error("Invalid detection rule: {0}")]
    InvalidRule(String),

    #[error("Unknown project type: {0}")]
    UnknownProjectType(String),

    #[error("{0}")]
    StackSelection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Model error: {0}")]
    Model(#[from] stackpack_model::ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IacError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        IacError::ProjectParse {
            path: path.into(),
            message: message.into(),
        }
    }
}
