//! Error types for the fee engine

use crate::fees::FeeModel;
use thiserror::Error;

/// Main error type for fee estimation and chain synchronisation
#[derive(Error, Debug)]
pub enum FeeError {
    #[error("Node unavailable: {message}")]
    NodeUnavailable { message: String },

    #[error("Fee data unavailable: node did not report {field} for the {model} fee model")]
    FeeDataUnavailable { model: FeeModel, field: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeeError {
    pub fn node(message: impl Into<String>) -> Self {
        FeeError::NodeUnavailable {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        FeeError::InvalidConfiguration(message.into())
    }

    /// Check if a caller could reasonably retry the failed operation.
    ///
    /// The engine itself never retries; this only classifies.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FeeError::NodeUnavailable { .. } | FeeError::Timeout { .. }
        )
    }

    /// Check if the error was raised before any network call was made
    pub fn is_configuration(&self) -> bool {
        matches!(self, FeeError::InvalidConfiguration(_))
    }
}

/// Result type for fee engine operations
pub type FeeResult<T> = Result<T, FeeError>;
