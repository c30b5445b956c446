//! Adaptive run interval estimation
//!
//! The background job tries to page through the whole known identity
//! population once per day. The more identities are mapped relative to the
//! smallest page size, the more runs per day are needed and the shorter the
//! interval becomes, always clamped into [`IntervalBounds`].

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Seconds in one day, the coverage period the interval targets
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Default shortest interval (30 minutes)
pub const DEFAULT_MIN_INTERVAL_SECS: u64 = 30 * 60;

/// Default longest interval (12 hours)
pub const DEFAULT_MAX_INTERVAL_SECS: u64 = 12 * 60 * 60;

/// Inclusive bounds for the self-tuned interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalBounds {
    min_secs: u64,
    max_secs: u64,
}

impl IntervalBounds {
    /// Creates bounds, rejecting `min > max` and a zero minimum
    pub fn new(min_secs: u64, max_secs: u64) -> Result<Self, DomainError> {
        if min_secs == 0 || min_secs > max_secs {
            return Err(DomainError::InvalidBounds {
                min: min_secs,
                max: max_secs,
            });
        }
        Ok(Self { min_secs, max_secs })
    }

    /// Lower bound in seconds
    #[must_use]
    pub fn min_secs(&self) -> u64 {
        self.min_secs
    }

    /// Upper bound in seconds
    #[must_use]
    pub fn max_secs(&self) -> u64 {
        self.max_secs
    }

    /// Clamps `secs` into the bounds
    #[must_use]
    pub fn clamp(&self, secs: u64) -> u64 {
        secs.clamp(self.min_secs, self.max_secs)
    }
}

impl Default for IntervalBounds {
    fn default() -> Self {
        Self {
            min_secs: DEFAULT_MIN_INTERVAL_SECS,
            max_secs: DEFAULT_MAX_INTERVAL_SECS,
        }
    }
}

/// Recomputes the run interval from the identity population
///
/// `runs_per_day = mapped / min_paging_size` and
/// `interval = floor(86400 / runs_per_day)`, evaluated as
/// `floor(86400 * min_paging_size / mapped)` so no precision is lost.
///
/// - `min_paging_size == 0` means unbounded paging: one full dump covers
///   everything, so the slowest rate (`max_secs`) is used.
/// - `mapped == 0` means zero runs per day are needed, which also resolves
///   to `max_secs` instead of dividing by zero.
///
/// ```
/// use dirsync_core::domain::interval::{recompute_interval, IntervalBounds};
///
/// let bounds = IntervalBounds::default();
/// assert_eq!(recompute_interval(10_000, 1_000, &bounds), 8_640);
/// ```
#[must_use]
pub fn recompute_interval(mapped: u64, min_paging_size: u64, bounds: &IntervalBounds) -> u64 {
    if min_paging_size == 0 || mapped == 0 {
        return bounds.max_secs();
    }

    let raw = u128::from(SECONDS_PER_DAY) * u128::from(min_paging_size) / u128::from(mapped);
    let raw = u64::try_from(raw).unwrap_or(u64::MAX);
    bounds.clamp(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds() {
        let bounds = IntervalBounds::default();
        assert_eq!(bounds.min_secs(), 1800);
        assert_eq!(bounds.max_secs(), 43200);
    }

    #[test]
    fn test_bounds_reject_inverted() {
        assert!(IntervalBounds::new(100, 50).is_err());
        assert!(IntervalBounds::new(0, 50).is_err());
        assert!(IntervalBounds::new(50, 50).is_ok());
    }

    #[test]
    fn test_ten_thousand_identities_thousand_page() {
        let bounds = IntervalBounds::default();
        assert_eq!(recompute_interval(10_000, 1_000, &bounds), 8_640);
    }

    #[test]
    fn test_large_population_hits_floor() {
        let bounds = IntervalBounds::default();
        // 1,000,000 / 500 = 2000 runs per day -> 43 s, clamped up
        assert_eq!(recompute_interval(1_000_000, 500, &bounds), 1800);
    }

    #[test]
    fn test_small_population_hits_ceiling() {
        let bounds = IntervalBounds::default();
        // 100 / 500 = 0.2 runs per day -> 432000 s, clamped down
        assert_eq!(recompute_interval(100, 500, &bounds), 43200);
    }

    #[test]
    fn test_zero_paging_size_is_slowest_rate() {
        let bounds = IntervalBounds::default();
        assert_eq!(recompute_interval(50_000, 0, &bounds), 43200);
    }

    #[test]
    fn test_zero_mapped_is_slowest_rate() {
        let bounds = IntervalBounds::default();
        assert_eq!(recompute_interval(0, 500, &bounds), 43200);
        assert_eq!(recompute_interval(0, 0, &bounds), 43200);
    }

    #[test]
    fn test_fractional_result_is_floored() {
        let bounds = IntervalBounds::new(1, u64::MAX).unwrap();
        // 86400 * 7 / 3 = 201600 exactly; 86400 * 1 / 7 = 12342.857...
        assert_eq!(recompute_interval(3, 7, &bounds), 201_600);
        assert_eq!(recompute_interval(7, 1, &bounds), 12_342);
    }

    #[test]
    fn test_always_within_bounds() {
        let bounds = IntervalBounds::default();
        let samples = [0u64, 1, 2, 49, 50, 499, 500, 1_000, 9_999, 123_456, u64::MAX];
        for &mapped in &samples {
            for &paging in &samples {
                let interval = recompute_interval(mapped, paging, &bounds);
                assert!(
                    (1800..=43200).contains(&interval),
                    "mapped={mapped} paging={paging} gave {interval}"
                );
            }
        }
    }
}
