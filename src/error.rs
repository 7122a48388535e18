//! Error types for rust_dge

use thiserror::Error;

/// Main error type for the differential expression pipeline.
///
/// The first four variants are the data-quality taxonomy: each one is
/// terminal for the current analysis and is never retried.
#[derive(Error, Debug)]
pub enum DgeError {
    #[error("Schema error: {reason}")]
    Schema { reason: String },

    #[error("Validation error: {reason}")]
    Validation { reason: String },

    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("Model fit error: {reason}")]
    ModelFit { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Coarse classification of a [`DgeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Validation,
    InsufficientData,
    ModelFit,
    InvalidInput,
    Io,
}

impl DgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DgeError::Schema { .. } => ErrorKind::Schema,
            DgeError::Validation { .. } => ErrorKind::Validation,
            DgeError::InsufficientData { .. } => ErrorKind::InsufficientData,
            DgeError::ModelFit { .. } => ErrorKind::ModelFit,
            DgeError::InvalidInput { .. } => ErrorKind::InvalidInput,
            DgeError::IoError(_) | DgeError::CsvError(_) | DgeError::JsonError(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn schema(reason: impl Into<String>) -> Self {
        DgeError::Schema { reason: reason.into() }
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        DgeError::Validation { reason: reason.into() }
    }

    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        DgeError::InsufficientData { reason: reason.into() }
    }

    pub(crate) fn model_fit(reason: impl Into<String>) -> Self {
        DgeError::ModelFit { reason: reason.into() }
    }

    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        DgeError::InvalidInput { reason: reason.into() }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, DgeError>;
