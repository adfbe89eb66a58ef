use thiserror::Error;

/// Core domain errors
///
/// Callers should retry `CompositionTimeout`, `CapacityExceeded` and `CompositionFailure`
/// (see [`DomainError::is_retryable`]); validation problems will fail again unchanged.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Composition failed for {key}: {message}")]
    CompositionFailure { key: String, message: String },

    #[error("Timed out after {waited_ms}ms waiting for composition {key}")]
    CompositionTimeout { key: String, waited_ms: u64 },

    #[error("Composition cache is full ({capacity} entries, none evictable)")]
    CapacityExceeded { capacity: usize },

    #[error("Generation error: {message}")]
    Generation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn composition_failure(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CompositionFailure {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn composition_timeout(key: impl Into<String>, waited_ms: u64) -> Self {
        Self::CompositionTimeout {
            key: key.into(),
            waited_ms,
        }
    }

    pub fn capacity_exceeded(capacity: usize) -> Self {
        Self::CapacityExceeded { capacity }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a client may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CompositionTimeout { .. }
                | Self::CapacityExceeded { .. }
                | Self::CompositionFailure { .. }
        )
    }

    /// Stable, low-cardinality name of the error kind (used as a metric label)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::CompositionFailure { .. } => "composition_failure",
            Self::CompositionTimeout { .. } => "composition_timeout",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::Generation { .. } => "generation",
            Self::Internal { .. } => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("Invalid input");
        assert_eq!(error.to_string(), "Validation error: Invalid input");
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_capacity_error() {
        let error = DomainError::capacity_exceeded(2);
        assert_eq!(
            error.to_string(),
            "Composition cache is full (2 entries, none evictable)"
        );
        assert!(error.is_retryable());
        assert_eq!(error.kind(), "capacity_exceeded");
    }

    #[test]
    fn test_timeout_is_distinct_from_failure() {
        let timeout = DomainError::composition_timeout("abc", 50);
        let failure = DomainError::composition_failure("abc", "boom");

        assert_ne!(timeout.kind(), failure.kind());
        assert!(timeout.is_retryable());
        assert!(failure.is_retryable());
        assert!(timeout.to_string().contains("50ms"));
    }
}
