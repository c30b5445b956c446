//! Domain entities and business logic
//!
//! This module contains the core domain types for dirsync:
//! - Newtypes for validated identifiers (`ProfilePrefix`)
//! - Cycle progress (`CycleState`) and page outcomes (`BatchResult`)
//! - Interval bounds and the adaptive interval estimator
//! - Directory filter construction
//! - Profile settings and the background job mode
//! - Domain-specific error types

pub mod cycle;
pub mod errors;
pub mod filter;
pub mod interval;
pub mod newtypes;
pub mod profile;

// Re-export commonly used types
pub use cycle::{BatchResult, CycleState};
pub use errors::DomainError;
pub use interval::{recompute_interval, IntervalBounds};
pub use newtypes::ProfilePrefix;
pub use profile::{BackgroundJobMode, ProfileSettings};
