//! Error types for the trainer crate

use kstarter_gbdt::ModelError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by data loading, configuration and training
#[derive(Debug, Error)]
pub enum StarterError {
    /// A required input file does not exist
    #[error("missing input: {} not found", path.display())]
    MissingInput { path: PathBuf },

    /// A named column is absent from a table
    #[error("column `{column}` not found in {table}")]
    MissingColumn { column: String, table: String },

    /// Train and inference columns disagree
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Target column is not a usable binary label
    #[error("invalid labels: {0}")]
    InvalidLabels(String),

    /// Unrecognized option value (model name, device, fold count, ...)
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

/// Result type for trainer operations
pub type Result<T> = std::result::Result<T, StarterError>;
