//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and malformed persisted values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid profile prefix format
    #[error("Invalid profile prefix: {0}")]
    InvalidPrefix(String),

    /// A persisted setting could not be parsed into its typed form
    #[error("Invalid value for setting {key}: {value}")]
    InvalidSetting {
        /// The setting key (without namespace)
        key: String,
        /// The raw stored value
        value: String,
    },

    /// Interval bounds are inverted or zero
    #[error("Invalid interval bounds: min {min} > max {max}")]
    InvalidBounds {
        /// Lower bound in seconds
        min: u64,
        /// Upper bound in seconds
        max: u64,
    },

    /// Unknown background job mode
    #[error("Unknown background job mode: {0}")]
    InvalidJobMode(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidPrefix("s 01".to_string());
        assert_eq!(err.to_string(), "Invalid profile prefix: s 01");

        let err = DomainError::InvalidSetting {
            key: "s01ldap_paging_size".to_string(),
            value: "lots".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for setting s01ldap_paging_size: lots"
        );

        let err = DomainError::InvalidBounds { min: 10, max: 5 };
        assert_eq!(err.to_string(), "Invalid interval bounds: min 10 > max 5");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidJobMode("hourly".to_string());
        let err2 = DomainError::InvalidJobMode("hourly".to_string());
        let err3 = DomainError::InvalidJobMode("daily".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
