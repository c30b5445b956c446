//! SQLite implementation of IIdentityMapper
//!
//! A directory entry is identified by its DN and receives a canonical local
//! name taken from the profile's username attribute (or its uuid attribute).
//! Once assigned, neither side of the DN/name pair is ever rebound.
//!
//! ## Type Mapping
//!
//! | Field          | SQL Type | Source                               |
//! |----------------|----------|--------------------------------------|
//! | dn             | TEXT     | `DirectoryRecord::dn`                |
//! | canonical_name | TEXT     | username attribute, else uuid        |
//! | directory_uuid | TEXT     | uuid attribute                       |
//! | display_name   | TEXT     | display name attribute (optional)    |
//! | email          | TEXT     | email attribute (optional)           |
//! | profile_prefix | TEXT     | `ProfilePrefix::as_str()`            |
//! | last_seen      | TEXT     | RFC 3339 timestamp of the last apply |

use chrono::Utc;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use dirsync_core::{
    domain::{ProfilePrefix, ProfileSettings},
    ports::{ApplyOutcome, DirectoryRecord, IIdentityMapper, MapperError},
};

/// Number of mapped identities attributed to one profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileMappingCount {
    pub prefix: String,
    pub mapped: u64,
}

/// SQLite-backed identity store
#[derive(Clone)]
pub struct SqliteIdentityMapper {
    pool: SqlitePool,
}

impl SqliteIdentityMapper {
    /// Creates a new mapper over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Canonical name bound to `dn`, if any
    pub async fn canonical_name_for(&self, dn: &str) -> anyhow::Result<Option<String>> {
        let name: Option<String> =
            sqlx::query_scalar("SELECT canonical_name FROM ldap_user_mapping WHERE dn = ?")
                .bind(dn)
                .fetch_optional(&self.pool)
                .await?;
        Ok(name)
    }

    /// Mapped identity counts grouped by profile, ordered by prefix
    pub async fn count_per_profile(&self) -> anyhow::Result<Vec<ProfileMappingCount>> {
        let rows = sqlx::query(
            "SELECT profile_prefix, COUNT(*) AS mapped FROM ldap_user_mapping \
             GROUP BY profile_prefix ORDER BY profile_prefix ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ProfileMappingCount {
                prefix: row.get("profile_prefix"),
                mapped: row.get::<i64, _>("mapped").max(0) as u64,
            })
            .collect())
    }
}

fn required_value<'a>(
    record: &'a DirectoryRecord,
    attribute: &str,
) -> Result<&'a str, MapperError> {
    record
        .first_value(attribute)
        .ok_or_else(|| MapperError::MalformedRecord {
            dn: record.dn.clone(),
            reason: format!("missing attribute {attribute}"),
        })
}

#[async_trait::async_trait]
impl IIdentityMapper for SqliteIdentityMapper {
    async fn count_mapped(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ldap_user_mapping")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn apply_record(
        &self,
        prefix: &ProfilePrefix,
        settings: &ProfileSettings,
        record: &DirectoryRecord,
    ) -> Result<ApplyOutcome, MapperError> {
        if record.dn.trim().is_empty() {
            return Err(MapperError::MalformedRecord {
                dn: record.dn.clone(),
                reason: "empty DN".to_string(),
            });
        }
        let uuid = required_value(record, &settings.uuid_attribute)?;
        let canonical_name = required_value(record, settings.canonical_name_attribute())?;
        let display_name = record.first_value(&settings.display_name_attribute);
        let email = settings
            .email_attribute
            .as_deref()
            .and_then(|attr| record.first_value(attr));

        let mut tx = self.pool.begin().await.map_err(anyhow::Error::from)?;

        let bound_name: Option<String> =
            sqlx::query_scalar("SELECT canonical_name FROM ldap_user_mapping WHERE dn = ?")
                .bind(&record.dn)
                .fetch_optional(&mut *tx)
                .await
                .map_err(anyhow::Error::from)?;
        if bound_name.as_deref().is_some_and(|name| name != canonical_name) {
            return Ok(ApplyOutcome::SkippedAlreadyMapped);
        }

        let bound_dn: Option<String> =
            sqlx::query_scalar("SELECT dn FROM ldap_user_mapping WHERE canonical_name = ?")
                .bind(canonical_name)
                .fetch_optional(&mut *tx)
                .await
                .map_err(anyhow::Error::from)?;
        if bound_dn.as_deref().is_some_and(|dn| dn != record.dn) {
            return Ok(ApplyOutcome::SkippedAlreadyMapped);
        }

        sqlx::query(
            "INSERT INTO ldap_user_mapping \
             (dn, canonical_name, directory_uuid, display_name, email, profile_prefix, last_seen) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (dn) DO UPDATE SET \
               directory_uuid = excluded.directory_uuid, \
               display_name = excluded.display_name, \
               email = excluded.email, \
               profile_prefix = excluded.profile_prefix, \
               last_seen = excluded.last_seen",
        )
        .bind(&record.dn)
        .bind(canonical_name)
        .bind(uuid)
        .bind(display_name)
        .bind(email)
        .bind(prefix.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(anyhow::Error::from)?;

        tx.commit().await.map_err(anyhow::Error::from)?;

        tracing::trace!(dn = %record.dn, name = %canonical_name, "Applied directory record");
        Ok(ApplyOutcome::Applied)
    }
}
