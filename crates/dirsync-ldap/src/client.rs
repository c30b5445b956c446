//! LDAP directory client
//!
//! Implements [`IDirectoryClient`] on top of `ldap3`. Every page fetch opens
//! its own connection, binds with the profile's agent credentials, searches
//! below the user base and unbinds.
//!
//! The search streams entries with the paged results control, so the server
//! never has to return more than one page per round trip. Entries before the
//! requested offset are skipped as they arrive and the search stops once the
//! page is full.
//!
//! ## Error Classification
//!
//! | Condition                                   | DirectoryError |
//! |---------------------------------------------|----------------|
//! | connect failure, I/O error, timeout         | `Unavailable`  |
//! | result code 51 (busy) or 52 (unavailable)   | `Unavailable`  |
//! | result code 4 (size limit) with entries     | partial page   |
//! | result code 49 (invalid credentials)        | `Misconfigured`|
//! | missing host, unparsable filter             | `Misconfigured`/`Protocol` |
//! | any other non-zero result code              | `Protocol`     |

use std::future::Future;
use std::time::Duration;

use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult, Scope, SearchEntry};
use tracing::{debug, warn};

use dirsync_core::{
    config::DirectoryConfig,
    domain::ProfileSettings,
    ports::{DirectoryError, DirectoryRecord, IDirectoryClient},
};

use crate::entry::record_from_entry;

const RC_SUCCESS: u32 = 0;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_BUSY: u32 = 51;
const RC_UNAVAILABLE: u32 = 52;

/// Server page size used when the profile fetches unbounded
const UNBOUNDED_SERVER_PAGE: u64 = 500;

/// Builds the server URL for a profile
///
/// The host may carry an `ldap://` or `ldaps://` scheme and its own port;
/// otherwise `ldap://` and the profile port are used.
pub fn server_url(settings: &ProfileSettings) -> Result<String, DirectoryError> {
    let host = settings.host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(DirectoryError::Misconfigured(format!(
            "profile {} has no host",
            settings.prefix
        )));
    }

    let (scheme, rest) = match host.split_once("://") {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => ("ldap".to_string(), host),
    };

    let has_port = !rest.ends_with(']')
        && rest
            .rsplit_once(':')
            .is_some_and(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()));

    if has_port {
        Ok(format!("{scheme}://{rest}"))
    } else {
        Ok(format!("{scheme}://{rest}:{}", settings.port))
    }
}

fn check_result(operation: &str, result: &LdapResult) -> Result<(), DirectoryError> {
    match result.rc {
        RC_SUCCESS => Ok(()),
        RC_INVALID_CREDENTIALS => Err(DirectoryError::Misconfigured(format!(
            "{operation} rejected the agent credentials"
        ))),
        RC_BUSY | RC_UNAVAILABLE => Err(DirectoryError::Unavailable(format!(
            "{operation} failed with code {}: {}",
            result.rc, result.text
        ))),
        rc => Err(DirectoryError::Protocol(format!(
            "{operation} failed with code {rc}: {}",
            result.text
        ))),
    }
}

/// Result check at the end of a search
///
/// A server size limit still yields the entries sent before it was hit;
/// those are used as a short page. Without any entry it is an error.
fn check_search_result(result: &LdapResult, received: u64) -> Result<(), DirectoryError> {
    if result.rc == RC_SIZE_LIMIT_EXCEEDED && received > 0 {
        warn!(
            received,
            text = %result.text,
            "Server size limit reached, keeping the entries returned"
        );
        return Ok(());
    }
    check_result("search", result)
}

fn transport_error(operation: &str, error: LdapError) -> DirectoryError {
    match error {
        LdapError::FilterParsing => {
            DirectoryError::Protocol(format!("{operation}: invalid search filter"))
        }
        other => DirectoryError::Unavailable(format!("{operation}: {other}")),
    }
}

/// Directory client speaking LDAP
#[derive(Debug, Clone)]
pub struct LdapDirectoryClient {
    connect_timeout: Duration,
    operation_timeout: Duration,
}

impl LdapDirectoryClient {
    /// Creates a client with explicit timeouts
    ///
    /// # Arguments
    /// * `connect_timeout` - Limit for establishing the connection (and StartTLS)
    /// * `operation_timeout` - Limit for each bind and search
    pub fn new(connect_timeout: Duration, operation_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            operation_timeout,
        }
    }

    /// Creates a client from the `directory` configuration section
    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.operation_timeout_secs),
        )
    }

    async fn within<T, F>(&self, operation: &str, fut: F) -> Result<T, DirectoryError>
    where
        F: Future<Output = ldap3::result::Result<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(transport_error(operation, e)),
            Err(_) => Err(DirectoryError::Unavailable(format!(
                "{operation} timed out after {}s",
                self.operation_timeout.as_secs()
            ))),
        }
    }

    async fn connect(&self, settings: &ProfileSettings) -> Result<Ldap, DirectoryError> {
        let url = server_url(settings)?;
        debug!(url = %url, start_tls = settings.start_tls, "Connecting to LDAP server");

        let conn_settings = LdapConnSettings::new()
            .set_conn_timeout(self.connect_timeout)
            .set_starttls(settings.start_tls);

        let (conn, mut ldap) = LdapConnAsync::with_settings(conn_settings, &url)
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("connect to {url}: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let password = settings.bind_password.as_deref().unwrap_or("");
        let result = self
            .within("bind", ldap.simple_bind(&settings.bind_dn, password))
            .await?;
        check_result("bind", &result)?;

        Ok(ldap)
    }

    /// Streams the search and keeps `page_size` entries after `offset`
    ///
    /// A `page_size` of 0 keeps every entry after `offset`.
    async fn search_page(
        &self,
        ldap: &mut Ldap,
        settings: &ProfileSettings,
        filter: &str,
        attributes: &[String],
        page_size: u64,
        offset: u64,
    ) -> Result<Vec<DirectoryRecord>, DirectoryError> {
        let server_page = if page_size == 0 {
            UNBOUNDED_SERVER_PAGE
        } else {
            page_size
        };
        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(
                i32::try_from(server_page).unwrap_or(i32::MAX),
            )),
        ];

        let mut search = self
            .within(
                "search",
                ldap.streaming_search_with(
                    adapters,
                    &settings.base_users,
                    Scope::Subtree,
                    filter,
                    attributes.to_vec(),
                ),
            )
            .await?;

        let limit = usize::try_from(page_size).unwrap_or(usize::MAX);
        let mut received: u64 = 0;
        let mut records = Vec::new();

        while let Some(entry) = self.within("search", search.next()).await? {
            received += 1;
            if received <= offset {
                continue;
            }
            records.push(record_from_entry(SearchEntry::construct(entry)));
            if page_size > 0 && records.len() >= limit {
                // Page full; the unbind that follows ends the search
                return Ok(records);
            }
        }

        let result = tokio::time::timeout(self.operation_timeout, search.finish())
            .await
            .map_err(|_| {
                DirectoryError::Unavailable(format!(
                    "search timed out after {}s",
                    self.operation_timeout.as_secs()
                ))
            })?;
        check_search_result(&result, received)?;

        Ok(records)
    }
}

#[async_trait::async_trait]
impl IDirectoryClient for LdapDirectoryClient {
    async fn fetch_page(
        &self,
        settings: &ProfileSettings,
        filter: &str,
        attributes: &[String],
        page_size: u64,
        offset: u64,
    ) -> Result<Vec<DirectoryRecord>, DirectoryError> {
        let mut ldap = self.connect(settings).await?;

        debug!(
            base = %settings.base_users,
            filter = %filter,
            page_size,
            offset,
            "Searching LDAP"
        );

        let page = self
            .search_page(&mut ldap, settings, filter, attributes, page_size, offset)
            .await;

        if let Err(e) = ldap.unbind().await {
            warn!(error = %e, "Error during LDAP unbind");
        }

        let records = page?;
        debug!(count = records.len(), "LDAP page fetched");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use dirsync_core::domain::profile::keys;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> ProfileSettings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ProfileSettings::from_lookup("s01".parse().unwrap(), |k| map.get(k).cloned()).unwrap()
    }

    #[test]
    fn test_url_defaults_to_ldap_scheme_and_port() {
        let s = settings(&[(keys::HOST, "ldap.example.com")]);
        assert_eq!(server_url(&s).unwrap(), "ldap://ldap.example.com:389");
    }

    #[test]
    fn test_url_keeps_scheme_and_explicit_port() {
        let s = settings(&[(keys::HOST, "LDAPS://ldap.example.com"), (keys::PORT, "636")]);
        assert_eq!(server_url(&s).unwrap(), "ldaps://ldap.example.com:636");

        let s = settings(&[(keys::HOST, "ldap://ldap.example.com:3389/")]);
        assert_eq!(server_url(&s).unwrap(), "ldap://ldap.example.com:3389");
    }

    #[test]
    fn test_url_bracketed_ipv6() {
        let s = settings(&[(keys::HOST, "[::1]")]);
        assert_eq!(server_url(&s).unwrap(), "ldap://[::1]:389");
    }

    #[test]
    fn test_missing_host_is_misconfigured() {
        let s = settings(&[]);
        assert!(matches!(
            server_url(&s),
            Err(DirectoryError::Misconfigured(_))
        ));
    }

    #[test]
    fn test_result_code_classification() {
        let result = |rc| LdapResult {
            rc,
            matched: String::new(),
            text: "text".to_string(),
            refs: Vec::new(),
            ctrls: Vec::new(),
        };
        assert!(check_result("search", &result(0)).is_ok());
        assert!(matches!(
            check_result("bind", &result(49)),
            Err(DirectoryError::Misconfigured(_))
        ));
        assert!(check_result("search", &result(51)).unwrap_err().is_unavailable());
        assert!(check_result("search", &result(52)).unwrap_err().is_unavailable());
        assert!(matches!(
            check_result("search", &result(32)),
            Err(DirectoryError::Protocol(_))
        ));
    }

    #[test]
    fn test_size_limit_with_entries_is_a_short_page() {
        let result = LdapResult {
            rc: 4,
            matched: String::new(),
            text: "size limit exceeded".to_string(),
            refs: Vec::new(),
            ctrls: Vec::new(),
        };
        assert!(check_search_result(&result, 120).is_ok());
        assert!(matches!(
            check_search_result(&result, 0),
            Err(DirectoryError::Protocol(_))
        ));
    }

    #[test]
    fn test_search_result_uses_common_classification() {
        let result = |rc| LdapResult {
            rc,
            matched: String::new(),
            text: String::new(),
            refs: Vec::new(),
            ctrls: Vec::new(),
        };
        assert!(check_search_result(&result(0), 0).is_ok());
        assert!(check_search_result(&result(51), 10).unwrap_err().is_unavailable());
        assert!(matches!(
            check_search_result(&result(32), 10),
            Err(DirectoryError::Protocol(_))
        ));
    }

    #[test]
    fn test_filter_errors_are_not_outages() {
        let err = transport_error("search", LdapError::FilterParsing);
        assert!(matches!(err, DirectoryError::Protocol(_)));
    }
}
