//! Error types for the task execution core.

use thiserror::Error;

/// Crate-level error aggregating the per-component taxonomies.
///
/// Component modules define their own precise error enums
/// ([`crate::invoker::InvokeError`], [`crate::store::StoreError`]); this type
/// is the surface they converge to at crate boundaries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskCoreError {
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Invocation error: {0}")]
    InvocationError(String),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Audit error: {0}")]
    AuditError(String),
    #[error("State transition error: {0}")]
    StateTransitionError(String),
}

impl From<serde_json::Error> for TaskCoreError {
    fn from(error: serde_json::Error) -> Self {
        TaskCoreError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for TaskCoreError {
    fn from(error: sqlx::Error) -> Self {
        TaskCoreError::StoreError(error.to_string())
    }
}

impl From<crate::invoker::InvokeError> for TaskCoreError {
    fn from(error: crate::invoker::InvokeError) -> Self {
        TaskCoreError::InvocationError(error.to_string())
    }
}

impl From<crate::store::StoreError> for TaskCoreError {
    fn from(error: crate::store::StoreError) -> Self {
        TaskCoreError::StoreError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaskCoreError>;
pub type TaskCoreResult<T> = anyhow::Result<T, TaskCoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_capability_message() {
        let error = TaskCoreError::UnknownCapability("bogus".to_string());
        assert_eq!(error.to_string(), "Unknown capability: bogus");
    }

    #[test]
    fn test_store_error_conversion() {
        let error: TaskCoreError =
            crate::store::StoreError::Database("connection refused".to_string()).into();
        assert_eq!(
            error,
            TaskCoreError::StoreError("Database error: connection refused".to_string())
        );
    }
}
