//! Error kinds surfaced by the prediction core

use thiserror::Error;

/// Failures raised by schema construction, record processing and scoring.
///
/// The HTTP layer maps each kind to a status code; none of them abort the
/// process.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No schema/model snapshot has been published yet
    #[error("service is not ready: schema and model have not been loaded")]
    NotReady,

    /// The request record cannot be processed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The reference dataset is unreadable or malformed
    #[error("data loading failed: {0}")]
    Dataset(String),

    /// The model artifact is missing or cannot be adapted
    #[error("model loading failed: {0}")]
    ModelLoad(String),

    /// The model call failed or returned unusable probabilities
    #[error("scoring failed: {0}")]
    Scoring(String),

    /// A snapshot lock was poisoned by a panicking thread
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Whether the failure happened while loading artifacts
    pub fn is_initialization(&self) -> bool {
        matches!(self, ServiceError::Dataset(_) | ServiceError::ModelLoad(_))
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
