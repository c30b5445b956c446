//! Directory-server profile settings
//!
//! A profile is one configured directory server. Its settings live in the
//! key/value store under `<prefix><setting>` in the [`APP_NAMESPACE`]
//! namespace; this module turns those raw strings into typed values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::ProfilePrefix;

/// Namespace holding all directory and scheduler state
pub const APP_NAMESPACE: &str = "user_ldap";

/// Namespace holding host-wide settings
pub const CORE_NAMESPACE: &str = "core";

/// Key (in [`CORE_NAMESPACE`]) selecting how background jobs are driven
pub const BACKGROUND_JOBS_MODE_KEY: &str = "backgroundjobs_mode";

/// Per-profile setting names (appended to the profile prefix)
pub mod keys {
    /// `"1"` when the profile is enabled
    pub const CONFIGURATION_ACTIVE: &str = "ldap_configuration_active";
    /// Server host, optionally with an `ldap://` or `ldaps://` scheme
    pub const HOST: &str = "ldap_host";
    /// Server port
    pub const PORT: &str = "ldap_port";
    /// `"1"` to upgrade the connection with StartTLS
    pub const TLS: &str = "ldap_tls";
    /// Bind DN
    pub const AGENT_DN: &str = "ldap_dn";
    /// Bind password
    pub const AGENT_PASSWORD: &str = "ldap_agent_password";
    /// Search base for users
    pub const BASE_USERS: &str = "ldap_base_users";
    /// Filter selecting the user population
    pub const USER_FILTER: &str = "ldap_userlist_filter";
    /// Attribute holding the display name
    pub const DISPLAY_NAME: &str = "ldap_display_name";
    /// Records requested per page; 0 disables paging
    pub const PAGING_SIZE: &str = "ldap_paging_size";
    /// Attribute holding a stable unique identifier
    pub const UUID_ATTRIBUTE: &str = "ldap_expert_uuid_user_attr";
    /// Attribute used as the canonical user name (falls back to the uuid)
    pub const USERNAME_ATTRIBUTE: &str = "ldap_expert_username_attr";
    /// Attribute holding the email address
    pub const EMAIL_ATTRIBUTE: &str = "ldap_email_attr";
    /// Newline separated attributes matched by free-text searches
    pub const SEARCH_ATTRIBUTES: &str = "ldap_attributes_for_user_search";
    /// Unix timestamp of the last settings change (note the underscore)
    pub const LAST_CHANGE: &str = "_lastChange";

    /// Every setting read when loading a profile
    pub const ALL: &[&str] = &[
        HOST,
        PORT,
        TLS,
        AGENT_DN,
        AGENT_PASSWORD,
        BASE_USERS,
        USER_FILTER,
        DISPLAY_NAME,
        PAGING_SIZE,
        UUID_ATTRIBUTE,
        USERNAME_ATTRIBUTE,
        EMAIL_ATTRIBUTE,
        SEARCH_ATTRIBUTES,
    ];
}

/// Default port for plain LDAP
pub const DEFAULT_PORT: u16 = 389;

/// Default number of records per page
pub const DEFAULT_PAGING_SIZE: u64 = 500;

/// Default display name attribute
pub const DEFAULT_DISPLAY_NAME_ATTRIBUTE: &str = "displayName";

/// Default uuid attribute
pub const DEFAULT_UUID_ATTRIBUTE: &str = "entryUUID";

/// Default user list filter
pub const DEFAULT_USER_FILTER: &str = "(objectClass=inetOrgPerson)";

// ============================================================================
// ProfileSettings
// ============================================================================

/// Typed view of one profile's stored settings
#[derive(Clone, PartialEq, Eq)]
pub struct ProfileSettings {
    pub prefix: ProfilePrefix,
    pub host: String,
    pub port: u16,
    pub start_tls: bool,
    pub bind_dn: String,
    pub bind_password: Option<String>,
    pub base_users: String,
    pub user_filter: String,
    pub display_name_attribute: String,
    pub uuid_attribute: String,
    pub username_attribute: Option<String>,
    pub email_attribute: Option<String>,
    pub search_attributes: Vec<String>,
    pub paging_size: u64,
}

impl fmt::Debug for ProfileSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileSettings")
            .field("prefix", &self.prefix)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("start_tls", &self.start_tls)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("base_users", &self.base_users)
            .field("user_filter", &self.user_filter)
            .field("display_name_attribute", &self.display_name_attribute)
            .field("uuid_attribute", &self.uuid_attribute)
            .field("username_attribute", &self.username_attribute)
            .field("email_attribute", &self.email_attribute)
            .field("search_attributes", &self.search_attributes)
            .field("paging_size", &self.paging_size)
            .finish()
    }
}

/// Treats absent and blank values the same way
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(prefix: &ProfilePrefix, setting: &str, raw: &str) -> Result<T, DomainError> {
    raw.trim().parse().map_err(|_| DomainError::InvalidSetting {
        key: prefix.key(setting),
        value: raw.to_string(),
    })
}

impl ProfileSettings {
    /// Builds settings from a lookup of unprefixed setting names
    ///
    /// `lookup` receives a name from [`keys::ALL`] and returns the stored
    /// value for this profile, if any. Missing values fall back to defaults.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSetting` when a numeric setting is not
    /// a number.
    pub fn from_lookup<F>(prefix: ProfilePrefix, lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |setting: &str| non_blank(lookup(setting));

        let port = match get(keys::PORT) {
            Some(raw) => parse_number(&prefix, keys::PORT, &raw)?,
            None => DEFAULT_PORT,
        };
        let paging_size = match get(keys::PAGING_SIZE) {
            Some(raw) => parse_number(&prefix, keys::PAGING_SIZE, &raw)?,
            None => DEFAULT_PAGING_SIZE,
        };

        let display_name_attribute = get(keys::DISPLAY_NAME)
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME_ATTRIBUTE.to_string());

        let search_attributes = match get(keys::SEARCH_ATTRIBUTES) {
            Some(raw) => raw
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            None => vec![display_name_attribute.clone()],
        };

        Ok(Self {
            host: get(keys::HOST).unwrap_or_default(),
            port,
            start_tls: get(keys::TLS).as_deref() == Some("1"),
            bind_dn: get(keys::AGENT_DN).unwrap_or_default(),
            bind_password: lookup(keys::AGENT_PASSWORD).filter(|p| !p.is_empty()),
            base_users: get(keys::BASE_USERS).unwrap_or_default(),
            user_filter: get(keys::USER_FILTER).unwrap_or_else(|| DEFAULT_USER_FILTER.to_string()),
            display_name_attribute,
            uuid_attribute: get(keys::UUID_ATTRIBUTE)
                .unwrap_or_else(|| DEFAULT_UUID_ATTRIBUTE.to_string()),
            username_attribute: get(keys::USERNAME_ATTRIBUTE),
            email_attribute: get(keys::EMAIL_ATTRIBUTE),
            search_attributes,
            paging_size,
            prefix,
        })
    }

    /// Attribute whose value becomes the canonical identity name
    #[must_use]
    pub fn canonical_name_attribute(&self) -> &str {
        self.username_attribute
            .as_deref()
            .unwrap_or(&self.uuid_attribute)
    }

    /// Attributes requested for every fetched record, without duplicates
    #[must_use]
    pub fn requested_attributes(&self) -> Vec<String> {
        let mut attrs: Vec<String> = Vec::new();
        let candidates = [
            Some(self.display_name_attribute.as_str()),
            Some(self.uuid_attribute.as_str()),
            self.username_attribute.as_deref(),
            self.email_attribute.as_deref(),
        ];
        for attr in candidates.into_iter().flatten() {
            if !attrs.iter().any(|a| a.eq_ignore_ascii_case(attr)) {
                attrs.push(attr.to_string());
            }
        }
        attrs
    }
}

// ============================================================================
// BackgroundJobMode
// ============================================================================

/// How the hosting environment drives background jobs
///
/// Only [`BackgroundJobMode::Ajax`] is interactive: jobs piggyback on user
/// requests, so long-running directory syncs must not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundJobMode {
    Ajax,
    Webcron,
    Cron,
}

impl BackgroundJobMode {
    /// Whether the scheduler runs autonomously in the background
    #[must_use]
    pub fn is_autonomous(&self) -> bool {
        !matches!(self, BackgroundJobMode::Ajax)
    }

    /// Storage representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundJobMode::Ajax => "ajax",
            BackgroundJobMode::Webcron => "webcron",
            BackgroundJobMode::Cron => "cron",
        }
    }
}

impl FromStr for BackgroundJobMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ajax" => Ok(BackgroundJobMode::Ajax),
            "webcron" => Ok(BackgroundJobMode::Webcron),
            "cron" => Ok(BackgroundJobMode::Cron),
            other => Err(DomainError::InvalidJobMode(other.to_string())),
        }
    }
}

impl fmt::Display for BackgroundJobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
