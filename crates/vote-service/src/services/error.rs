//! Service layer error types
//!
//! Provides a unified error type for all service operations.

use std::fmt;
use vote_common::AppError;
use vote_core::{DomainError, ErrorKind};

/// Service layer error type
#[derive(Debug)]
pub enum ServiceError {
    /// Domain rule violation or store failure
    Domain(DomainError),

    /// Application error (auth, config, etc.)
    App(AppError),

    /// Request failed input validation
    Validation(String),

    /// Background task died before reporting
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{e}"),
            Self::App(e) => write!(f, "{e}"),
            Self::Validation(msg) => write!(f, "Validation error: {msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            Self::App(e) => Some(e),
            _ => None,
        }
    }
}

impl ServiceError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify into the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(e) => e.kind(),
            Self::App(e) => e.kind(),
            Self::Validation(_) => ErrorKind::Invalid,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get the error code for responses and logs
    pub fn error_code(&self) -> &str {
        match self {
            Self::Domain(e) => e.code(),
            Self::App(e) => e.error_code(),
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// The wrapped domain error, if any
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(e) | Self::App(AppError::Domain(e)) => Some(e),
            _ => None,
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<AppError> for ServiceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Domain(e) => Self::Domain(e),
            other => Self::App(other),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => AppError::Domain(e),
            ServiceError::App(e) => e,
            ServiceError::Validation(msg) => AppError::Validation(msg),
            ServiceError::Internal(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use vote_core::EntityId;

    #[test]
    fn test_domain_error_kind_passes_through() {
        let err = ServiceError::from(DomainError::EntityNotFound(EntityId::parse("p1").unwrap()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.error_code(), "UNKNOWN_ENTITY");
        assert!(err.as_domain().is_some_and(DomainError::is_not_found));
    }

    #[test]
    fn test_app_domain_error_is_flattened() {
        let err = ServiceError::from(AppError::Domain(DomainError::Unauthenticated));
        assert!(matches!(err, ServiceError::Domain(DomainError::Unauthenticated)));
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_validation_error() {
        let err = ServiceError::validation("entity_ids: too many");
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_retries_exhausted_is_unavailable() {
        let err = ServiceError::from(DomainError::RetriesExhausted {
            entity_id: EntityId::parse("p1").unwrap(),
            attempts: 5,
        });
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_convert_to_app_error() {
        let app_err: AppError = ServiceError::internal("task panicked").into();
        assert_eq!(app_err.kind(), ErrorKind::Internal);

        let app_err: AppError = ServiceError::validation("bad").into();
        assert_eq!(app_err.kind(), ErrorKind::Invalid);
    }
}
