//! Profile registry
//!
//! Enumerates the configured directory profiles from the key/value store.
//! A profile exists when a `<prefix>ldap_configuration_active` key exists;
//! it is enabled when that value is `"1"`.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use dirsync_core::{
    domain::{
        profile::{keys, APP_NAMESPACE},
        ProfilePrefix,
    },
    ports::IConfigStore,
};

/// A configured profile and whether it takes part in background sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileEntry {
    pub prefix: ProfilePrefix,
    pub enabled: bool,
}

/// Read-only view over the profiles stored in the config store
#[derive(Clone)]
pub struct ProfileRegistry {
    store: Arc<dyn IConfigStore + Send + Sync>,
}

impl ProfileRegistry {
    pub fn new(store: Arc<dyn IConfigStore + Send + Sync>) -> Self {
        Self { store }
    }

    /// Every configured profile, enabled or not, sorted by prefix
    pub async fn list_profiles(&self) -> anyhow::Result<Vec<ProfileEntry>> {
        let active_keys = self
            .store
            .list_keys_containing(APP_NAMESPACE, keys::CONFIGURATION_ACTIVE)
            .await?;

        let mut profiles = Vec::new();
        for key in active_keys {
            let Some(raw_prefix) = key.strip_suffix(keys::CONFIGURATION_ACTIVE) else {
                continue;
            };
            let prefix = match ProfilePrefix::new(raw_prefix.to_string()) {
                Ok(prefix) => prefix,
                Err(e) => {
                    warn!(key = %key, error = %e, "Ignoring profile with invalid prefix");
                    continue;
                }
            };
            let enabled = self
                .store
                .get_value(APP_NAMESPACE, &key)
                .await?
                .is_some_and(|v| v.trim() == "1");
            profiles.push(ProfileEntry { prefix, enabled });
        }

        profiles.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        profiles.dedup_by(|a, b| a.prefix == b.prefix);
        Ok(profiles)
    }

    /// Prefixes of enabled profiles in registry order
    ///
    /// Ordering is lexicographic and therefore stable as long as the
    /// configuration does not change. An empty result is not an error.
    pub async fn list_enabled_profiles(&self) -> anyhow::Result<Vec<ProfilePrefix>> {
        Ok(self
            .list_profiles()
            .await?
            .into_iter()
            .filter(|p| p.enabled)
            .map(|p| p.prefix)
            .collect())
    }
}

/// Picks the profile following `last` in `profiles`, wrapping around
///
/// Falls back to the first profile when `last` is absent or no longer
/// listed. Returns `None` only for an empty list.
#[must_use]
pub fn next_after(profiles: &[ProfilePrefix], last: Option<&ProfilePrefix>) -> Option<ProfilePrefix> {
    let position = last.and_then(|last| profiles.iter().position(|p| p == last));
    let index = match position {
        Some(i) => (i + 1) % profiles.len(),
        None => 0,
    };
    profiles.get(index).cloned()
}

#[cfg(test)]
mod tests {
    use dirsync_cache::DatabasePool;

    use super::*;

    fn prefixes(names: &[&str]) -> Vec<ProfilePrefix> {
        names.iter().map(|n| n.parse().unwrap()).collect()
    }

    async fn registry_with(pairs: &[(&str, &str)]) -> ProfileRegistry {
        let db = DatabasePool::in_memory().await.unwrap();
        let store = db.config_store();
        for (k, v) in pairs {
            store.set_value(APP_NAMESPACE, k, v).await.unwrap();
        }
        ProfileRegistry::new(Arc::new(store))
    }

    #[test]
    fn test_next_after_walks_in_order_and_wraps() {
        let list = prefixes(&["a", "b", "c"]);
        let a = &list[0];
        let b = &list[1];
        let c = &list[2];
        assert_eq!(next_after(&list, Some(a)).as_ref(), Some(b));
        assert_eq!(next_after(&list, Some(b)).as_ref(), Some(c));
        assert_eq!(next_after(&list, Some(c)).as_ref(), Some(a));
    }

    #[test]
    fn test_next_after_without_last_picks_first() {
        let list = prefixes(&["a", "b"]);
        assert_eq!(next_after(&list, None), Some(list[0].clone()));

        let unknown: ProfilePrefix = "zz".parse().unwrap();
        assert_eq!(next_after(&list, Some(&unknown)), Some(list[0].clone()));
    }

    #[test]
    fn test_next_after_single_profile_returns_itself() {
        let list = prefixes(&["only"]);
        assert_eq!(next_after(&list, Some(&list[0])), Some(list[0].clone()));
    }

    #[test]
    fn test_next_after_empty_is_none() {
        assert_eq!(next_after(&[], None), None);
    }

    #[tokio::test]
    async fn test_lists_only_enabled_profiles_sorted() {
        let registry = registry_with(&[
            ("s02ldap_configuration_active", "1"),
            ("ldap_configuration_active", "1"),
            ("s01ldap_configuration_active", "0"),
            ("s03ldap_configuration_active", "1"),
            ("s03ldap_host", "ldap.example.com"),
        ])
        .await;

        let enabled = registry.list_enabled_profiles().await.unwrap();
        assert_eq!(enabled, prefixes(&["", "s02", "s03"]));

        let all = registry.list_profiles().await.unwrap();
        assert_eq!(all.len(), 4);
        assert!(!all.iter().find(|p| p.prefix.as_str() == "s01").unwrap().enabled);
    }

    #[tokio::test]
    async fn test_empty_registry_is_not_an_error() {
        let registry = registry_with(&[]).await;
        assert!(registry.list_enabled_profiles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_is_stable() {
        let registry = registry_with(&[
            ("b_ldap_configuration_active", "1"),
            ("a_ldap_configuration_active", "1"),
        ])
        .await;
        let first = registry.list_enabled_profiles().await.unwrap();
        let second = registry.list_enabled_profiles().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, prefixes(&["a_", "b_"]));
    }
}
