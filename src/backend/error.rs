//! Backend error types

use thiserror::Error;

/// Errors returned by the hosted backend collaborators.
///
/// None of these are fatal to a view: callers log them and skip the cycle.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend unreachable or returned a server-side failure
    #[error("{operation}: backend unavailable - {message}")]
    Unavailable { operation: String, message: String },

    /// The request did not complete in time
    #[error("{operation}: timed out")]
    Timeout { operation: String },

    /// The backend refused the request (row-level policy, validation)
    #[error("{operation}: rejected - {message}")]
    Rejected { operation: String, message: String },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    pub fn unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError::Unavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        BackendError::Timeout {
            operation: operation.into(),
        }
    }

    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether retrying on the next cycle may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Unavailable { .. } | BackendError::Timeout { .. } | BackendError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient() {
        assert!(BackendError::unavailable("count_artifacts", "503").is_transient());
        assert!(BackendError::timeout("count_artifacts").is_transient());
        assert!(!BackendError::rejected("upsert", "policy").is_transient());
    }

    #[test]
    fn test_display() {
        let err = BackendError::unavailable("count_artifacts", "connection reset");
        assert_eq!(
            err.to_string(),
            "count_artifacts: backend unavailable - connection reset"
        );
        assert_eq!(
            BackendError::timeout("subscribe").to_string(),
            "subscribe: timed out"
        );
    }
}
