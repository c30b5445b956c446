//! Directory client port (driven/secondary port)
//!
//! This module defines the interface for reading user records from a
//! directory server. The primary implementation speaks LDAP, but the trait
//! only deals in filter strings and flat records.
//!
//! ## Design Notes
//!
//! - Unlike the storage ports, this port returns a classified error:
//!   callers must tell a recoverable outage ([`DirectoryError::Unavailable`])
//!   apart from every other failure.
//! - Timeouts are owned by the implementation and reported as
//!   `Unavailable`, never as an indefinite block.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{filter::combine_filter_with_and, ProfileSettings};

// ============================================================================
// DirectoryRecord
// ============================================================================

/// A single entry returned by a directory search
///
/// Attribute names are stored lower-cased so lookups are case-insensitive,
/// matching directory semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    /// Distinguished name of the entry
    pub dn: String,
    /// Attribute values keyed by lower-cased attribute name
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryRecord {
    /// Creates an empty record for `dn`
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Adds attribute values, normalising the name
    #[must_use]
    pub fn with_attribute(mut self, name: &str, values: Vec<String>) -> Self {
        self.attributes
            .entry(name.to_ascii_lowercase())
            .or_default()
            .extend(values);
        self
    }

    /// Returns the first non-empty value of an attribute
    #[must_use]
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.iter().find(|v| !v.trim().is_empty()))
            .map(String::as_str)
    }
}

// ============================================================================
// DirectoryError
// ============================================================================

/// Failures reported by a directory client
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The server could not be reached or timed out; retrying later may succeed
    #[error("Directory server unavailable: {0}")]
    Unavailable(String),

    /// The server answered but rejected the request
    #[error("Directory protocol error: {0}")]
    Protocol(String),

    /// The profile is not usable (e.g. no host configured)
    #[error("Directory misconfigured: {0}")]
    Misconfigured(String),
}

impl DirectoryError {
    /// Whether the error is a transient outage
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DirectoryError::Unavailable(_))
    }
}

// ============================================================================
// IDirectoryClient trait
// ============================================================================

/// Port trait for directory search operations
#[async_trait::async_trait]
pub trait IDirectoryClient: Send + Sync {
    /// AND-combines filter fragments, dropping empty ones
    fn combine_filter(&self, parts: &[String]) -> String {
        combine_filter_with_and(parts)
    }

    /// Fetches one page of records
    ///
    /// # Arguments
    /// * `settings` - Connection and search settings of the profile
    /// * `filter` - Complete search filter
    /// * `attributes` - Attributes to return for every record
    /// * `page_size` - Maximum records to return; 0 returns everything
    /// * `offset` - Number of matching records to skip
    async fn fetch_page(
        &self,
        settings: &ProfileSettings,
        filter: &str,
        attributes: &[String],
        page_size: u64,
        offset: u64,
    ) -> Result<Vec<DirectoryRecord>, DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_lookup_is_case_insensitive() {
        let record = DirectoryRecord::new("uid=alice,dc=example,dc=com")
            .with_attribute("displayName", vec!["Alice".to_string()]);
        assert_eq!(record.first_value("displayname"), Some("Alice"));
        assert_eq!(record.first_value("DISPLAYNAME"), Some("Alice"));
        assert_eq!(record.first_value("mail"), None);
    }

    #[test]
    fn test_first_value_skips_blank() {
        let record = DirectoryRecord::new("uid=bob")
            .with_attribute("mail", vec!["  ".to_string(), "bob@example.com".to_string()]);
        assert_eq!(record.first_value("mail"), Some("bob@example.com"));
    }

    #[test]
    fn test_unavailable_classification() {
        assert!(DirectoryError::Unavailable("timeout".into()).is_unavailable());
        assert!(!DirectoryError::Protocol("rc=32".into()).is_unavailable());
        assert!(!DirectoryError::Misconfigured("no host".into()).is_unavailable());
    }
}
