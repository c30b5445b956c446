//! Identity mapper port (driven/secondary port)
//!
//! The identity mapper owns the local identity store: the mapping between
//! directory entries (by DN) and canonical local identity names, plus the
//! user attributes copied from the directory.

use thiserror::Error;

use crate::{
    domain::{ProfilePrefix, ProfileSettings},
    ports::directory_client::DirectoryRecord,
};

/// Result of applying one record to the identity store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record was mapped (new) or its attributes refreshed
    Applied,
    /// The DN or the canonical name is already bound to a different identity
    SkippedAlreadyMapped,
}

/// Failures while applying a record
#[derive(Debug, Error)]
pub enum MapperError {
    /// The record lacks a required attribute; only this record is affected
    #[error("Malformed record {dn}: {reason}")]
    MalformedRecord {
        /// DN of the offending record
        dn: String,
        /// What is missing or invalid
        reason: String,
    },

    /// The identity store itself failed
    #[error("Identity store failure: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Port trait for the local identity store
#[async_trait::async_trait]
pub trait IIdentityMapper: Send + Sync {
    /// Number of identities currently mapped, across all profiles
    async fn count_mapped(&self) -> anyhow::Result<u64>;

    /// Maps or refreshes a single directory record
    async fn apply_record(
        &self,
        prefix: &ProfilePrefix,
        settings: &ProfileSettings,
        record: &DirectoryRecord,
    ) -> Result<ApplyOutcome, MapperError>;
}
