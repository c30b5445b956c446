//! Config/persistence store port (driven/secondary port)
//!
//! This module defines the generic namespaced key/value store that holds
//! all scheduler state and profile settings.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, filesystem, etc.) and don't need domain-level classification.
//!   Every error from this port is a persistence failure for the caller.
//! - Implementations must provide read-after-write consistency per key.
//! - `set_values` must be atomic: readers never observe a partial batch.

use anyhow::Context;

use crate::domain::{
    profile::{keys, APP_NAMESPACE},
    ProfilePrefix, ProfileSettings,
};

/// Port trait for namespaced key/value persistence
#[async_trait::async_trait]
pub trait IConfigStore: Send + Sync {
    /// Reads a value, `None` if the key was never written
    async fn get_value(&self, namespace: &str, key: &str) -> anyhow::Result<Option<String>>;

    /// Writes (inserts or replaces) a single value
    async fn set_value(&self, namespace: &str, key: &str, value: &str) -> anyhow::Result<()>;

    /// Writes several values in one atomic batch
    async fn set_values(&self, namespace: &str, values: &[(&str, String)]) -> anyhow::Result<()>;

    /// Removes a value; removing a missing key is not an error
    async fn delete_value(&self, namespace: &str, key: &str) -> anyhow::Result<()>;

    /// Lists every key in a namespace, in ascending order
    async fn list_keys(&self, namespace: &str) -> anyhow::Result<Vec<String>>;

    /// Lists keys in a namespace that contain `fragment`
    ///
    /// The default implementation filters [`list_keys`](IConfigStore::list_keys);
    /// adapters may push the filter down into their query.
    async fn list_keys_containing(
        &self,
        namespace: &str,
        fragment: &str,
    ) -> anyhow::Result<Vec<String>> {
        let keys = self.list_keys(namespace).await?;
        Ok(keys.into_iter().filter(|k| k.contains(fragment)).collect())
    }
}

/// Loads the typed settings of one profile from the store
///
/// # Errors
///
/// Fails if the store cannot be read or a numeric setting is malformed.
pub async fn load_profile_settings(
    store: &dyn IConfigStore,
    prefix: &ProfilePrefix,
) -> anyhow::Result<ProfileSettings> {
    let mut values = std::collections::HashMap::new();
    for setting in keys::ALL {
        if let Some(value) = store
            .get_value(APP_NAMESPACE, &prefix.key(setting))
            .await
            .with_context(|| format!("Failed to read setting {}", prefix.key(setting)))?
        {
            values.insert(*setting, value);
        }
    }

    let settings = ProfileSettings::from_lookup(prefix.clone(), |setting| {
        values.get(setting).cloned()
    })
    .with_context(|| format!("Invalid settings for profile {prefix}"))?;

    Ok(settings)
}
