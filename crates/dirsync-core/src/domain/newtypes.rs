//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Profile identifiers
// ============================================================================

/// Prefix identifying one directory-server profile
///
/// Every per-profile setting is stored under `<prefix><setting>`, so the
/// prefix doubles as the profile's identity. The empty string is a valid
/// prefix: the first profile ever configured historically has none.
///
/// Format: no whitespace, no control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfilePrefix(String);

impl ProfilePrefix {
    /// Create a new ProfilePrefix
    ///
    /// # Errors
    /// Returns error if the prefix contains whitespace or control characters
    pub fn new(prefix: String) -> Result<Self, DomainError> {
        if prefix
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(DomainError::InvalidPrefix(prefix));
        }
        Ok(Self(prefix))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the storage key for a per-profile setting
    ///
    /// ```
    /// use dirsync_core::domain::ProfilePrefix;
    ///
    /// let prefix = ProfilePrefix::new("s01".to_string()).unwrap();
    /// assert_eq!(prefix.key("ldap_paging_size"), "s01ldap_paging_size");
    /// ```
    #[must_use]
    pub fn key(&self, setting: &str) -> String {
        format!("{}{}", self.0, setting)
    }
}

impl Display for ProfilePrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<default>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for ProfilePrefix {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for ProfilePrefix {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ProfilePrefix> for String {
    fn from(prefix: ProfilePrefix) -> Self {
        prefix.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_prefixes() {
        assert!(ProfilePrefix::new("s01".to_string()).is_ok());
        assert!(ProfilePrefix::new("".to_string()).is_ok());
        assert!(ProfilePrefix::new("corp_east".to_string()).is_ok());
    }

    #[test]
    fn test_rejects_whitespace() {
        assert!(ProfilePrefix::new("s 01".to_string()).is_err());
        assert!(ProfilePrefix::new("s01\n".to_string()).is_err());
    }

    #[test]
    fn test_display_empty_prefix() {
        let prefix = ProfilePrefix::new(String::new()).unwrap();
        assert_eq!(prefix.to_string(), "<default>");
        assert_eq!(prefix.as_str(), "");
    }

    #[test]
    fn test_key_concatenation() {
        let prefix: ProfilePrefix = "s02".parse().unwrap();
        assert_eq!(prefix.key("_lastChange"), "s02_lastChange");

        let empty: ProfilePrefix = "".parse().unwrap();
        assert_eq!(empty.key("ldap_host"), "ldap_host");
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut prefixes: Vec<ProfilePrefix> = ["s02", "", "s01"]
            .iter()
            .map(|p| p.parse().unwrap())
            .collect();
        prefixes.sort();
        let ordered: Vec<&str> = prefixes.iter().map(ProfilePrefix::as_str).collect();
        assert_eq!(ordered, vec!["", "s01", "s02"]);
    }

    #[test]
    fn test_serde_roundtrip() {
        let prefix: ProfilePrefix = "s01".parse().unwrap();
        let json = serde_json::to_string(&prefix).unwrap();
        assert_eq!(json, "\"s01\"");
        let back: ProfilePrefix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prefix);
        assert!(serde_json::from_str::<ProfilePrefix>("\"a b\"").is_err());
    }
}
