//! Cycle state store
//!
//! Durable scheduler progress kept in the [`APP_NAMESPACE`] namespace:
//!
//! | Key                        | Value                              |
//! |----------------------------|------------------------------------|
//! | `background_sync_prefix`   | prefix of the profile in progress  |
//! | `background_sync_offset`   | records already paged through      |
//! | `background_sync_interval` | current run interval in seconds    |
//! | `<prefix>_lastChange`      | unix time of the last settings edit|
//!
//! The prefix/offset pair is always written in one atomic batch.

use std::sync::Arc;

use tracing::{debug, warn};

use dirsync_core::{
    domain::{
        profile::{keys, APP_NAMESPACE},
        CycleState, IntervalBounds, ProfilePrefix,
    },
    ports::IConfigStore,
};

use crate::registry::ProfileRegistry;

/// Key holding the prefix of the profile in progress
pub const PREFIX_KEY: &str = "background_sync_prefix";

/// Key holding the offset into the profile in progress
pub const OFFSET_KEY: &str = "background_sync_offset";

/// Key holding the self-tuned run interval
pub const INTERVAL_KEY: &str = "background_sync_interval";

/// Fragment shared by every per-profile paging size key
const PAGING_SIZE_FRAGMENT: &str = keys::PAGING_SIZE;

/// Store adapter for cycle progress, cooldown stamps and the interval
#[derive(Clone)]
pub struct CycleStateStore {
    store: Arc<dyn IConfigStore + Send + Sync>,
    registry: ProfileRegistry,
}

impl CycleStateStore {
    pub fn new(store: Arc<dyn IConfigStore + Send + Sync>, registry: ProfileRegistry) -> Self {
        Self { store, registry }
    }

    /// The prefix recorded as in progress, even if it is no longer registered
    pub async fn get_recorded_prefix(&self) -> anyhow::Result<Option<ProfilePrefix>> {
        let Some(raw) = self.store.get_value(APP_NAMESPACE, PREFIX_KEY).await? else {
            return Ok(None);
        };
        match ProfilePrefix::new(raw) {
            Ok(prefix) => Ok(Some(prefix)),
            Err(e) => {
                warn!(error = %e, "Ignoring invalid recorded cycle prefix");
                Ok(None)
            }
        }
    }

    /// The active cycle
    ///
    /// `None` when nothing is recorded or the recorded profile is not an
    /// enabled profile anymore.
    pub async fn get_cycle(&self) -> anyhow::Result<Option<CycleState>> {
        let Some(prefix) = self.get_recorded_prefix().await? else {
            return Ok(None);
        };

        let enabled = self.registry.list_enabled_profiles().await?;
        if !enabled.contains(&prefix) {
            debug!(prefix = %prefix, "Recorded cycle refers to a retired profile");
            return Ok(None);
        }

        let offset = match self.store.get_value(APP_NAMESPACE, OFFSET_KEY).await? {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid recorded cycle offset, restarting at 0");
                0
            }),
            None => 0,
        };

        Ok(Some(CycleState::resume(prefix, offset)))
    }

    /// Persists prefix and offset together
    pub async fn set_cycle(&self, cycle: &CycleState) -> anyhow::Result<()> {
        self.store
            .set_values(
                APP_NAMESPACE,
                &[
                    (PREFIX_KEY, cycle.prefix().as_str().to_string()),
                    (OFFSET_KEY, cycle.offset().to_string()),
                ],
            )
            .await?;

        debug!(prefix = %cycle.prefix(), offset = cycle.offset(), "Cycle state persisted");
        Ok(())
    }

    /// Unix time of the last settings change of `prefix`, 0 if never recorded
    pub async fn get_last_change(&self, prefix: &ProfilePrefix) -> anyhow::Result<i64> {
        let value = self
            .store
            .get_value(APP_NAMESPACE, &prefix.key(keys::LAST_CHANGE))
            .await?;
        Ok(value.and_then(|v| v.trim().parse().ok()).unwrap_or(0))
    }

    /// Stamps the last settings change of `prefix`
    pub async fn set_last_change(&self, prefix: &ProfilePrefix, unix_time: i64) -> anyhow::Result<()> {
        self.store
            .set_value(
                APP_NAMESPACE,
                &prefix.key(keys::LAST_CHANGE),
                &unix_time.to_string(),
            )
            .await
    }

    /// Smallest paging size across all profile paging settings
    ///
    /// Scans every key containing `ldap_paging_size`, enabled profile or
    /// not. Returns 0 when no such key holds a number.
    pub async fn get_min_paging_size(&self) -> anyhow::Result<u64> {
        let paging_keys = self
            .store
            .list_keys_containing(APP_NAMESPACE, PAGING_SIZE_FRAGMENT)
            .await?;

        let mut min: Option<u64> = None;
        for key in paging_keys {
            let Some(raw) = self.store.get_value(APP_NAMESPACE, &key).await? else {
                continue;
            };
            match raw.trim().parse::<u64>() {
                Ok(size) => min = Some(min.map_or(size, |m| m.min(size))),
                Err(_) => warn!(key = %key, value = %raw, "Ignoring non-numeric paging size"),
            }
        }

        Ok(min.unwrap_or(0))
    }

    /// Current run interval, the lower bound if never computed
    pub async fn get_interval(&self, bounds: &IntervalBounds) -> anyhow::Result<u64> {
        let value = self.store.get_value(APP_NAMESPACE, INTERVAL_KEY).await?;
        Ok(value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_else(|| bounds.min_secs()))
    }

    pub async fn set_interval(&self, secs: u64) -> anyhow::Result<()> {
        self.store
            .set_value(APP_NAMESPACE, INTERVAL_KEY, &secs.to_string())
            .await
    }
}

#[cfg(test)]
mod tests {
    use dirsync_cache::DatabasePool;

    use super::*;

    async fn setup(pairs: &[(&str, &str)]) -> CycleStateStore {
        let db = DatabasePool::in_memory().await.unwrap();
        let store: Arc<dyn IConfigStore + Send + Sync> = Arc::new(db.config_store());
        for (k, v) in pairs {
            store.set_value(APP_NAMESPACE, k, v).await.unwrap();
        }
        CycleStateStore::new(store.clone(), ProfileRegistry::new(store))
    }

    fn p(name: &str) -> ProfilePrefix {
        name.parse().unwrap()
    }

    #[tokio::test]
    async fn test_no_cycle_recorded() {
        let store = setup(&[("s01ldap_configuration_active", "1")]).await;
        assert_eq!(store.get_cycle().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get_cycle() {
        let store = setup(&[("s01ldap_configuration_active", "1")]).await;
        store.set_cycle(&CycleState::resume(p("s01"), 150)).await.unwrap();

        assert_eq!(
            store.get_cycle().await.unwrap(),
            Some(CycleState::resume(p("s01"), 150))
        );
    }

    #[tokio::test]
    async fn test_stale_prefix_reads_as_no_cycle() {
        let store = setup(&[
            ("s01ldap_configuration_active", "0"),
            (PREFIX_KEY, "s01"),
            (OFFSET_KEY, "100"),
        ])
        .await;

        assert_eq!(store.get_cycle().await.unwrap(), None);
        assert_eq!(store.get_recorded_prefix().await.unwrap(), Some(p("s01")));
    }

    #[tokio::test]
    async fn test_last_change_defaults_to_zero() {
        let store = setup(&[]).await;
        assert_eq!(store.get_last_change(&p("s01")).await.unwrap(), 0);

        store.set_last_change(&p("s01"), 1_700_000_000).await.unwrap();
        assert_eq!(store.get_last_change(&p("s01")).await.unwrap(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_min_paging_size_across_profiles() {
        let store = setup(&[
            ("ldap_paging_size", "500"),
            ("s01ldap_paging_size", "200"),
            ("s02ldap_paging_size", ""),
            ("s03ldap_paging_size", "1000"),
        ])
        .await;
        assert_eq!(store.get_min_paging_size().await.unwrap(), 200);
    }

    #[tokio::test]
    async fn test_min_paging_size_zero_without_settings() {
        let store = setup(&[("s01ldap_host", "ldap.example.com")]).await;
        assert_eq!(store.get_min_paging_size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_interval_defaults_to_lower_bound() {
        let store = setup(&[]).await;
        let bounds = IntervalBounds::default();
        assert_eq!(store.get_interval(&bounds).await.unwrap(), 1800);

        store.set_interval(8640).await.unwrap();
        assert_eq!(store.get_interval(&bounds).await.unwrap(), 8640);
    }
}
