//! Sync cycle progress types
//!
//! A *cycle* is the pointer that tracks how far background synchronization
//! has paged through the currently active profile. It is persisted after
//! every invocation and re-read at the start of the next one.
//!
//! ## Invariants
//!
//! - The offset is exactly 0 whenever the active profile changes.
//! - Within one profile the offset only grows, by exactly one page size per
//!   full-page fetch.

use serde::{Deserialize, Serialize};

use super::newtypes::ProfilePrefix;

// ============================================================================
// CycleState
// ============================================================================

/// Progress pointer for the profile currently being synchronized
///
/// "No active cycle" is represented as `Option<CycleState>::None` by the
/// store, never by a sentinel prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    prefix: ProfilePrefix,
    offset: u64,
}

impl CycleState {
    /// Starts a fresh cycle for `prefix` at offset 0
    #[must_use]
    pub fn start(prefix: ProfilePrefix) -> Self {
        Self { prefix, offset: 0 }
    }

    /// Rebuilds a cycle from persisted values
    #[must_use]
    pub fn resume(prefix: ProfilePrefix, offset: u64) -> Self {
        Self { prefix, offset }
    }

    /// The profile this cycle belongs to
    #[must_use]
    pub fn prefix(&self) -> &ProfilePrefix {
        &self.prefix
    }

    /// Number of records already paged through for this profile
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the cycle advanced by one page on the same profile
    #[must_use]
    pub fn advanced_by(&self, page_size: u64) -> Self {
        Self {
            prefix: self.prefix.clone(),
            offset: self.offset.saturating_add(page_size),
        }
    }
}

// ============================================================================
// BatchResult
// ============================================================================

/// Outcome of a single page fetch, consumed immediately by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Number of records the directory returned
    pub fetched: u64,
    /// Page size that was requested (0 means unbounded)
    pub page_size: u64,
}

impl BatchResult {
    /// Whether the same profile should be paged further
    ///
    /// A full page implies there may be more. A short page means the
    /// profile is exhausted. With unbounded paging (`page_size == 0`) the
    /// directory returns everything in one call, so the cycle retires
    /// immediately.
    #[must_use]
    pub fn expects_more(&self) -> bool {
        self.page_size > 0 && self.fetched == self.page_size
    }
}
