//! Batch fetch use case
//!
//! Pulls one bounded page of user records for a profile from the directory
//! and applies each record to the local identity store. Builds the search
//! filter from the profile's settings and reports whether the profile has
//! more pages.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    domain::{
        filter::user_search_filter, BatchResult, DomainError, ProfilePrefix, ProfileSettings,
    },
    ports::{
        load_profile_settings, ApplyOutcome, DirectoryError, IConfigStore, IDirectoryClient,
        IIdentityMapper, MapperError,
    },
};

/// Failures of a batch fetch
///
/// [`FetchError::Unavailable`], [`FetchError::Directory`] and
/// [`FetchError::InvalidSettings`] concern a single profile and are
/// recoverable by moving on to the next one. [`FetchError::Settings`] and
/// [`FetchError::Storage`] are local persistence failures.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The directory server for the profile could not be reached
    #[error("Directory for profile {prefix} unavailable: {source}")]
    Unavailable {
        prefix: ProfilePrefix,
        #[source]
        source: DirectoryError,
    },

    /// The directory rejected the request or the profile is unusable
    #[error("Directory request for profile {prefix} failed: {source}")]
    Directory {
        prefix: ProfilePrefix,
        #[source]
        source: DirectoryError,
    },

    /// The stored settings of the profile cannot be interpreted
    #[error("Invalid settings for profile {prefix}: {source}")]
    InvalidSettings {
        prefix: ProfilePrefix,
        #[source]
        source: DomainError,
    },

    /// Profile settings could not be read from the store
    #[error("Failed to load profile settings: {0:#}")]
    Settings(#[source] anyhow::Error),

    /// The identity store failed while applying records
    #[error("Failed to apply records: {0:#}")]
    Storage(#[source] anyhow::Error),
}

/// Summary of one fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Fetched count and requested page size
    pub result: BatchResult,
    /// Records mapped or refreshed
    pub applied: u64,
    /// Records skipped because they collide with an existing mapping
    pub skipped: u64,
    /// Records skipped because they lack required attributes
    pub malformed: u64,
}

/// Use case for fetching and applying one page of directory records
pub struct FetchBatchUseCase {
    directory: Arc<dyn IDirectoryClient + Send + Sync>,
    identity_mapper: Arc<dyn IIdentityMapper + Send + Sync>,
    config_store: Arc<dyn IConfigStore + Send + Sync>,
}

impl FetchBatchUseCase {
    /// Creates a new FetchBatchUseCase with the required dependencies
    ///
    /// # Arguments
    ///
    /// * `directory` - Directory client issuing the paged search
    /// * `identity_mapper` - Identity store receiving the records
    /// * `config_store` - Store holding the profile settings
    pub fn new(
        directory: Arc<dyn IDirectoryClient + Send + Sync>,
        identity_mapper: Arc<dyn IIdentityMapper + Send + Sync>,
        config_store: Arc<dyn IConfigStore + Send + Sync>,
    ) -> Self {
        Self {
            directory,
            identity_mapper,
            config_store,
        }
    }

    /// Builds the combined search filter for a profile
    ///
    /// Base user filter AND display name present AND the search term part
    /// (absent for an empty term).
    pub fn build_filter(&self, settings: &ProfileSettings, search_term: &str) -> String {
        self.directory.combine_filter(&[
            settings.user_filter.clone(),
            format!("{}=*", settings.display_name_attribute),
            user_search_filter(search_term, &settings.search_attributes),
        ])
    }

    /// Fetches the page starting at `offset` and applies it
    ///
    /// This method:
    /// 1. Loads the profile settings (page size, filter, attributes)
    /// 2. Requests exactly `page_size` records starting at `offset`
    /// 3. Applies every record, isolating per-record failures
    /// 4. Returns the fetched count alongside the page size
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Unavailable` when the directory is unreachable,
    /// `FetchError::Directory` when it rejects the request,
    /// `FetchError::InvalidSettings` when the profile settings cannot be
    /// interpreted, and `Settings`/`Storage` when the local stores fail.
    pub async fn execute(
        &self,
        prefix: &ProfilePrefix,
        offset: u64,
        search_term: &str,
    ) -> Result<BatchReport, FetchError> {
        let settings = load_profile_settings(self.config_store.as_ref(), prefix)
            .await
            .map_err(|e| match e.downcast::<DomainError>() {
                Ok(source) => FetchError::InvalidSettings {
                    prefix: prefix.clone(),
                    source,
                },
                Err(e) => FetchError::Settings(e),
            })?;

        let filter = self.build_filter(&settings, search_term);
        let attributes = settings.requested_attributes();
        let page_size = settings.paging_size;

        debug!(
            prefix = %prefix,
            offset,
            page_size,
            filter = %filter,
            "Fetching directory page"
        );

        let records = self
            .directory
            .fetch_page(&settings, &filter, &attributes, page_size, offset)
            .await
            .map_err(|source| {
                if source.is_unavailable() {
                    FetchError::Unavailable {
                        prefix: prefix.clone(),
                        source,
                    }
                } else {
                    FetchError::Directory {
                        prefix: prefix.clone(),
                        source,
                    }
                }
            })?;

        let mut applied = 0u64;
        let mut skipped = 0u64;
        let mut malformed = 0u64;

        for record in &records {
            match self
                .identity_mapper
                .apply_record(prefix, &settings, record)
                .await
            {
                Ok(ApplyOutcome::Applied) => applied += 1,
                Ok(ApplyOutcome::SkippedAlreadyMapped) => {
                    debug!(dn = %record.dn, "Record already mapped to another identity, skipping");
                    skipped += 1;
                }
                Err(MapperError::MalformedRecord { dn, reason }) => {
                    warn!(dn = %dn, reason = %reason, "Skipping malformed record");
                    malformed += 1;
                }
                Err(MapperError::Storage(e)) => return Err(FetchError::Storage(e)),
            }
        }

        let report = BatchReport {
            result: BatchResult {
                fetched: records.len() as u64,
                page_size,
            },
            applied,
            skipped,
            malformed,
        };

        info!(
            prefix = %prefix,
            offset,
            fetched = report.result.fetched,
            applied,
            skipped,
            malformed,
            "Directory page applied"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    use super::*;
    use crate::domain::profile::APP_NAMESPACE;
    use crate::ports::DirectoryRecord;

    /// In-memory key/value store
    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<BTreeMap<(String, String), String>>,
    }

    impl MemoryStore {
        fn with(pairs: &[(&str, &str)]) -> Self {
            let store = Self::default();
            {
                let mut values = store.values.lock().unwrap();
                for (k, v) in pairs {
                    values.insert((APP_NAMESPACE.to_string(), k.to_string()), v.to_string());
                }
            }
            store
        }
    }

    #[async_trait::async_trait]
    impl IConfigStore for MemoryStore {
        async fn get_value(&self, ns: &str, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self
                .values
                .lock()
                .unwrap()
                .get(&(ns.to_string(), key.to_string()))
                .cloned())
        }
        async fn set_value(&self, ns: &str, key: &str, value: &str) -> anyhow::Result<()> {
            self.values
                .lock()
                .unwrap()
                .insert((ns.to_string(), key.to_string()), value.to_string());
            Ok(())
        }
        async fn set_values(&self, ns: &str, values: &[(&str, String)]) -> anyhow::Result<()> {
            let mut guard = self.values.lock().unwrap();
            for (k, v) in values {
                guard.insert((ns.to_string(), k.to_string()), v.clone());
            }
            Ok(())
        }
        async fn delete_value(&self, ns: &str, key: &str) -> anyhow::Result<()> {
            self.values
                .lock()
                .unwrap()
                .remove(&(ns.to_string(), key.to_string()));
            Ok(())
        }
        async fn list_keys(&self, ns: &str) -> anyhow::Result<Vec<String>> {
            Ok(self
                .values
                .lock()
                .unwrap()
                .keys()
                .filter(|(n, _)| n == ns)
                .map(|(_, k)| k.clone())
                .collect())
        }
    }

    /// Directory returning a fixed set of records, recording requests
    struct FakeDirectory {
        records: Vec<DirectoryRecord>,
        unavailable: bool,
        requests: Mutex<Vec<(String, u64, u64)>>,
    }

    impl FakeDirectory {
        fn with_records(count: usize) -> Self {
            let records = (0..count)
                .map(|i| {
                    DirectoryRecord::new(format!("uid=user{i},dc=example,dc=com"))
                        .with_attribute("entryUUID", vec![format!("uuid-{i}")])
                        .with_attribute("displayName", vec![format!("User {i}")])
                })
                .collect();
            Self {
                records,
                unavailable: false,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                records: Vec::new(),
                unavailable: true,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl IDirectoryClient for FakeDirectory {
        async fn fetch_page(
            &self,
            _settings: &ProfileSettings,
            filter: &str,
            _attributes: &[String],
            page_size: u64,
            offset: u64,
        ) -> Result<Vec<DirectoryRecord>, DirectoryError> {
            self.requests
                .lock()
                .unwrap()
                .push((filter.to_string(), page_size, offset));
            if self.unavailable {
                return Err(DirectoryError::Unavailable("connection refused".into()));
            }
            let iter = self.records.iter().skip(offset as usize).cloned();
            Ok(if page_size == 0 {
                iter.collect()
            } else {
                iter.take(page_size as usize).collect()
            })
        }
    }

    /// Mapper that rejects records missing a uuid and skips known DNs
    #[derive(Default)]
    struct FakeMapper {
        already_mapped: HashSet<String>,
        applied: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl IIdentityMapper for FakeMapper {
        async fn count_mapped(&self) -> anyhow::Result<u64> {
            Ok(self.applied.lock().unwrap().len() as u64)
        }

        async fn apply_record(
            &self,
            _prefix: &ProfilePrefix,
            settings: &ProfileSettings,
            record: &DirectoryRecord,
        ) -> Result<ApplyOutcome, MapperError> {
            if record.first_value(&settings.uuid_attribute).is_none() {
                return Err(MapperError::MalformedRecord {
                    dn: record.dn.clone(),
                    reason: "missing uuid".into(),
                });
            }
            if self.already_mapped.contains(&record.dn) {
                return Ok(ApplyOutcome::SkippedAlreadyMapped);
            }
            self.applied.lock().unwrap().push(record.dn.clone());
            Ok(ApplyOutcome::Applied)
        }
    }

    fn prefix() -> ProfilePrefix {
        "s01".parse().unwrap()
    }

    fn use_case(
        directory: Arc<FakeDirectory>,
        mapper: Arc<FakeMapper>,
        store: MemoryStore,
    ) -> FetchBatchUseCase {
        FetchBatchUseCase::new(directory, mapper, Arc::new(store))
    }

    #[tokio::test]
    async fn test_full_page_expects_more() {
        let directory = Arc::new(FakeDirectory::with_records(120));
        let mapper = Arc::new(FakeMapper::default());
        let store = MemoryStore::with(&[("s01ldap_paging_size", "50")]);
        let uc = use_case(directory.clone(), mapper.clone(), store);

        let report = uc.execute(&prefix(), 50, "").await.unwrap();

        assert_eq!(report.result, BatchResult { fetched: 50, page_size: 50 });
        assert!(report.result.expects_more());
        assert_eq!(report.applied, 50);

        let requests = directory.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1, 50);
        assert_eq!(requests[0].2, 50);
    }

    #[tokio::test]
    async fn test_short_page_is_exhausted() {
        let directory = Arc::new(FakeDirectory::with_records(120));
        let mapper = Arc::new(FakeMapper::default());
        let store = MemoryStore::with(&[("s01ldap_paging_size", "50")]);
        let uc = use_case(directory, mapper, store);

        let report = uc.execute(&prefix(), 100, "").await.unwrap();
        assert_eq!(report.result.fetched, 20);
        assert!(!report.result.expects_more());
    }

    #[tokio::test]
    async fn test_unbounded_paging_fetches_everything() {
        let directory = Arc::new(FakeDirectory::with_records(700));
        let mapper = Arc::new(FakeMapper::default());
        let store = MemoryStore::with(&[("s01ldap_paging_size", "0")]);
        let uc = use_case(directory, mapper, store);

        let report = uc.execute(&prefix(), 0, "").await.unwrap();
        assert_eq!(report.result, BatchResult { fetched: 700, page_size: 0 });
        assert!(!report.result.expects_more());
    }

    #[tokio::test]
    async fn test_filter_combines_base_display_name_and_term() {
        let directory = Arc::new(FakeDirectory::with_records(0));
        let mapper = Arc::new(FakeMapper::default());
        let store = MemoryStore::with(&[
            ("s01ldap_userlist_filter", "(objectClass=person)"),
            ("s01ldap_display_name", "cn"),
        ]);
        let uc = use_case(directory.clone(), mapper, store);

        uc.execute(&prefix(), 0, "").await.unwrap();
        uc.execute(&prefix(), 0, "ali").await.unwrap();

        let requests = directory.requests.lock().unwrap();
        assert_eq!(requests[0].0, "(&(objectClass=person)(cn=*))");
        assert_eq!(requests[1].0, "(&(objectClass=person)(cn=*)(cn=*ali*))");
    }

    #[tokio::test]
    async fn test_malformed_and_already_mapped_records_do_not_abort() {
        let mut base = FakeDirectory::with_records(3);
        base.records
            .insert(1, DirectoryRecord::new("uid=broken,dc=example,dc=com"));
        let directory = Arc::new(base);

        let mut mapper = FakeMapper::default();
        mapper
            .already_mapped
            .insert("uid=user2,dc=example,dc=com".to_string());
        let mapper = Arc::new(mapper);

        let store = MemoryStore::with(&[("s01ldap_paging_size", "10")]);
        let uc = use_case(directory, mapper.clone(), store);

        let report = uc.execute(&prefix(), 0, "").await.unwrap();
        assert_eq!(report.result.fetched, 4);
        assert_eq!(report.applied, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.malformed, 1);
        assert_eq!(mapper.applied.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_recoverable() {
        let directory = Arc::new(FakeDirectory::unreachable());
        let mapper = Arc::new(FakeMapper::default());
        let uc = use_case(directory, mapper, MemoryStore::default());

        let err = uc.execute(&prefix(), 0, "").await.unwrap_err();
        assert!(matches!(err, FetchError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_invalid_paging_size_is_reported_per_profile() {
        let directory = Arc::new(FakeDirectory::with_records(1));
        let mapper = Arc::new(FakeMapper::default());
        let store = MemoryStore::with(&[("s01ldap_paging_size", "fifty")]);
        let uc = use_case(directory, mapper.clone(), store);

        let err = uc.execute(&prefix(), 0, "").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::InvalidSettings { ref prefix, .. } if prefix.as_str() == "s01"
        ));
        assert!(mapper.applied.lock().unwrap().is_empty());
    }
}
