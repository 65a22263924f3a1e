//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// History buffer was created without room for a single message
    #[error("Invalid history capacity: {capacity} (expected at least 1)")]
    InvalidHistoryCapacity { capacity: usize },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_display() {
        let err = DomainError::InvalidHistoryCapacity { capacity: 0 };
        assert_eq!(
            err.to_string(),
            "Invalid history capacity: 0 (expected at least 1)"
        );
    }
}
