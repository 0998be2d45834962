/// Error types for social-graph-service
use std::time::Duration;
use thiserror::Error;

use crate::repository::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Optimistic-commit conflicts and timeouts are worth another attempt;
    /// everything else is a definitive answer for the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Store(StoreError::Conflict(_)) | ServiceError::Timeout(_)
        )
    }

    pub fn invalid_range() -> Self {
        ServiceError::Validation("Invalid range".to_string())
    }
}

impl From<resilience::TimeoutError> for ServiceError {
    fn from(err: resilience::TimeoutError) -> Self {
        match err {
            resilience::TimeoutError::Elapsed(duration) => ServiceError::Timeout(duration),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
