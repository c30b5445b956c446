//! dirsync Sync - Adaptive background directory synchronization
//!
//! Provides:
//! - Round-robin paging through every enabled directory profile
//! - Durable cycle progress (profile, offset) with atomic updates
//! - A cooldown after profile settings change
//! - A self-tuning run interval
//!
//! ## Modules
//!
//! - [`registry`] - Enabled profile enumeration and round-robin order
//! - [`cycle_store`] - Persisted cycle state, cooldown stamps and interval
//! - [`controller`] - The per-invocation state machine

pub mod controller;
pub mod cycle_store;
pub mod registry;

pub use controller::{
    ControllerSettings, IdleReason, RunOutcome, RunReport, SchedulerStatus, SkipReason,
    SyncCycleController,
};
pub use cycle_store::CycleStateStore;
pub use registry::{next_after, ProfileEntry, ProfileRegistry};

use thiserror::Error;

/// Errors that abort a sync invocation
#[derive(Debug, Error)]
pub enum SyncError {
    /// The key/value or identity store could not be read or written
    #[error("Persistence failure: {0:#}")]
    Persistence(#[source] anyhow::Error),
}
