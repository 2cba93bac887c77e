//! Infrastructure error types.
//!
//! Stores speak [`StoreError`]; services fold store, domain and publication
//! failures into [`ServiceError`], which is what the HTTP layer maps to
//! responses.

use thiserror::Error;

use custodia_auth::{PasswordError, TokenError};
use custodia_core::DomainError;

/// Store operation error.
///
/// Business rejections raised inside a unit of work (and store-level rules
/// such as code uniqueness or lock timeouts) travel as `Domain`; everything
/// else is a backend failure the caller cannot fix.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn poisoned() -> Self {
        Self::Backend("lock poisoned".to_string())
    }
}

/// Service-level error.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Deterministic business failure (validation, stock, conflict, ...).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The store failed; the unit of work did not commit.
    #[error("store failure: {0}")]
    Store(String),

    /// Publication failed after a successful commit. The change stands.
    #[error("event publication failed: {0}")]
    Publish(String),

    /// Unknown username or wrong password; the caller is not told which.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl ServiceError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.domain().is_some_and(DomainError::is_retryable)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(e) => ServiceError::Domain(e),
            StoreError::Backend(msg) => ServiceError::Store(msg),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_domain_errors_stay_domain_errors() {
        let err: ServiceError = StoreError::from(DomainError::conflict("row locked")).into();
        assert!(err.is_retryable());
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));

        let err: ServiceError = StoreError::backend("connection reset").into();
        assert!(matches!(err, ServiceError::Store(_)));
        assert!(!err.is_retryable());
    }
}
