//! Clock port
//!
//! Time is injected so the configuration-change cooldown can be tested
//! without sleeping.

use chrono::{DateTime, Utc};

/// Source of the current time
pub trait IClock: Send + Sync {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation backed by [`Utc::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl IClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
