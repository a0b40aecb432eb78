//! Error types for SVM training and inference

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SVMError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Probability estimates unavailable: {0}")]
    ProbabilityUnavailable(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Training cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for SVMError {
    fn from(err: serde_json::Error) -> Self {
        SVMError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SVMError>;
