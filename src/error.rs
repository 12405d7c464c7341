//! Error types for credit-scope

use thiserror::Error;

/// Result type alias for credit-scope operations
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Main error type
#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Optimization error: {0}")]
    OptimizationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::prelude::PolarsError> for ScopeError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        ScopeError::DataError(err.to_string())
    }
}

impl From<calamine::Error> for ScopeError {
    fn from(err: calamine::Error) -> Self {
        ScopeError::DataError(format!("spreadsheet: {}", err))
    }
}

impl From<serde_json::Error> for ScopeError {
    fn from(err: serde_json::Error) -> Self {
        ScopeError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ScopeError {
    fn from(err: ndarray::ShapeError) -> Self {
        ScopeError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
