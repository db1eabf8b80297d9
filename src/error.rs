//! Error types shared by the indexes and the classifier.

use thiserror::Error;

/// Errors reported by index construction, neighbor queries and prediction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KnnError {
    /// Malformed or inconsistent shapes: empty training set, mismatched
    /// feature/label counts, dimension mismatch, non-finite values, `k == 0`.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Prediction was requested before a successful `fit`.
    #[error("Model has not been trained. Call fit() first.")]
    NotFitted,
}

impl KnnError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        KnnError::InvalidInput(message.into())
    }
}

pub type Result<T> = std::result::Result<T, KnnError>;
