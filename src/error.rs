//! Error types for the mccv cross-validation harness

use thiserror::Error;

/// Result type alias for mccv operations
pub type Result<T> = std::result::Result<T, MccvError>;

/// Main error type for the harness.
///
/// Variants split into two groups. Fatal errors (configuration, dataset,
/// I/O) abort a run before any partition is drawn. Local errors
/// ([`MccvError::FitError`], [`MccvError::ScoreError`]) belong to a single
/// (partition, model) cell and are recorded on that cell instead.
#[derive(Error, Debug)]
pub enum MccvError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown model family: {0}")]
    UnknownModel(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Dataset error: {0}")]
    DatasetError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Fit error: {0}")]
    FitError(String),

    #[error("Score error: {0}")]
    ScoreError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

impl MccvError {
    /// Whether the error is confined to one (partition, model) cell.
    pub fn is_local(&self) -> bool {
        matches!(self, MccvError::FitError(_) | MccvError::ScoreError(_))
    }
}

impl From<polars::error::PolarsError> for MccvError {
    fn from(err: polars::error::PolarsError) -> Self {
        MccvError::DatasetError(err.to_string())
    }
}

impl From<serde_json::Error> for MccvError {
    fn from(err: serde_json::Error) -> Self {
        MccvError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MccvError {
    fn from(err: ndarray::ShapeError) -> Self {
        MccvError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
