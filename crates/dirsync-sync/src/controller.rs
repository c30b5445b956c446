//! Sync cycle controller
//!
//! The [`SyncCycleController`] performs one step of the background sync
//! state machine per invocation. States are "no cycle" and "cycle active
//! (profile, offset)".
//!
//! ## Invocation Flow
//!
//! 1. **Mode guard**: nothing happens while background jobs are interactive
//! 2. **Resolve cycle**: resume the recorded cycle or start the next profile
//! 3. **Cooldown**: profiles edited within the cooldown window are deferred
//! 4. **Batch**: fetch one page, then advance, retire or skip the profile
//! 5. **Interval**: recompute and persist the run interval
//!
//! Only persistence failures propagate. A directory that is unreachable or
//! refuses the request, or a profile whose settings cannot be interpreted,
//! moves the rotation on to the next profile.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use dirsync_core::{
    config::SchedulerConfig,
    domain::{
        profile::{BACKGROUND_JOBS_MODE_KEY, CORE_NAMESPACE},
        recompute_interval, BackgroundJobMode, CycleState, DomainError, IntervalBounds,
        ProfilePrefix,
    },
    ports::{IClock, IConfigStore, IDirectoryClient, IIdentityMapper},
    usecases::{BatchReport, FetchBatchUseCase, FetchError},
};

use crate::{
    cycle_store::CycleStateStore,
    registry::{next_after, ProfileRegistry},
    SyncError,
};

// ============================================================================
// Settings
// ============================================================================

/// Tunables of the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Bounds for the self-tuned interval
    pub bounds: IntervalBounds,
    /// Seconds after a settings change during which a profile is not synced
    pub cooldown_secs: u64,
    /// Mode assumed when the store does not record one
    pub default_mode: BackgroundJobMode,
    /// Search term narrowing every fetch (empty for the whole population)
    pub search_term: String,
}

impl ControllerSettings {
    /// Builds settings from the scheduler configuration section
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidBounds` for inconsistent interval bounds.
    pub fn from_config(config: &SchedulerConfig) -> Result<Self, DomainError> {
        Ok(Self {
            bounds: config.interval_bounds()?,
            cooldown_secs: config.cooldown_secs,
            default_mode: config.default_background_mode,
            search_term: config.search_term.clone(),
        })
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            bounds: IntervalBounds::default(),
            cooldown_secs: 1800,
            default_mode: BackgroundJobMode::Cron,
            search_term: String::new(),
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why an invocation did no work at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Background jobs are driven by user requests
    InteractiveMode,
}

/// Why an invocation found nothing to sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleReason {
    /// No profile is enabled
    EmptyRegistry,
}

/// What a single invocation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Nothing was read or written
    Skipped { reason: SkipReason },
    /// No cycle could be started; only the interval was refreshed
    Idle { reason: IdleReason },
    /// The profile is cooling down after a settings change
    Deferred {
        prefix: ProfilePrefix,
        last_change: i64,
    },
    /// A full page was applied; the offset moved forward
    Advanced {
        prefix: ProfilePrefix,
        next_offset: u64,
        report: BatchReport,
    },
    /// The profile was paged through; the rotation moved on
    Retired {
        prefix: ProfilePrefix,
        next: Option<ProfilePrefix>,
        report: BatchReport,
    },
    /// The directory was unreachable; the rotation moved on
    Unavailable {
        prefix: ProfilePrefix,
        next: Option<ProfilePrefix>,
        error: String,
    },
    /// The directory refused the request or the profile settings are
    /// unusable; the rotation moved on
    Rejected {
        prefix: ProfilePrefix,
        next: Option<ProfilePrefix>,
        error: String,
    },
}

/// Result of [`SyncCycleController::run_once`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Interval persisted by this invocation, if any
    pub interval_secs: Option<u64>,
}

/// Point-in-time view of the scheduler state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub mode: BackgroundJobMode,
    pub enabled_profiles: Vec<ProfilePrefix>,
    pub recorded_prefix: Option<ProfilePrefix>,
    pub cycle: Option<CycleState>,
    pub interval_secs: u64,
    pub mapped_identities: u64,
    pub min_paging_size: u64,
}

// ============================================================================
// SyncCycleController
// ============================================================================

/// Drives the adaptive round-robin sync, one page per invocation
pub struct SyncCycleController {
    store: Arc<dyn IConfigStore + Send + Sync>,
    identity_mapper: Arc<dyn IIdentityMapper + Send + Sync>,
    clock: Arc<dyn IClock>,
    registry: ProfileRegistry,
    cycles: CycleStateStore,
    fetcher: FetchBatchUseCase,
    settings: ControllerSettings,
}

impl SyncCycleController {
    /// Creates a controller from its collaborators
    ///
    /// # Arguments
    ///
    /// * `directory` - Directory client used by the batch fetcher
    /// * `identity_mapper` - Identity store receiving records and counting mappings
    /// * `store` - Key/value store holding settings and scheduler state
    /// * `clock` - Time source for the cooldown check
    /// * `settings` - Interval bounds, cooldown and defaults
    pub fn new(
        directory: Arc<dyn IDirectoryClient + Send + Sync>,
        identity_mapper: Arc<dyn IIdentityMapper + Send + Sync>,
        store: Arc<dyn IConfigStore + Send + Sync>,
        clock: Arc<dyn IClock>,
        settings: ControllerSettings,
    ) -> Self {
        let registry = ProfileRegistry::new(store.clone());
        let cycles = CycleStateStore::new(store.clone(), registry.clone());
        let fetcher = FetchBatchUseCase::new(directory, identity_mapper.clone(), store.clone());

        Self {
            store,
            identity_mapper,
            clock,
            registry,
            cycles,
            fetcher,
            settings,
        }
    }

    /// Runs one step of the state machine
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Persistence` when the store cannot be read or
    /// written.
    /// Cycle state is never partially written.
    pub async fn run_once(&self) -> Result<RunReport, SyncError> {
        let mode = self.background_mode().await?;
        if !mode.is_autonomous() {
            debug!(mode = %mode, "Background jobs are interactive, skipping directory sync");
            return Ok(RunReport {
                outcome: RunOutcome::Skipped {
                    reason: SkipReason::InteractiveMode,
                },
                interval_secs: None,
            });
        }

        let cycle = match self.cycles.get_cycle().await.map_err(SyncError::Persistence)? {
            Some(cycle) => cycle,
            None => {
                let last = self
                    .cycles
                    .get_recorded_prefix()
                    .await
                    .map_err(SyncError::Persistence)?;
                match self.determine_next_cycle(last.as_ref()).await? {
                    Some(prefix) => CycleState::start(prefix),
                    None => {
                        info!("No enabled directory profiles");
                        let interval = self.update_interval().await?;
                        return Ok(RunReport {
                            outcome: RunOutcome::Idle {
                                reason: IdleReason::EmptyRegistry,
                            },
                            interval_secs: Some(interval),
                        });
                    }
                }
            }
        };

        let last_change = self
            .cycles
            .get_last_change(cycle.prefix())
            .await
            .map_err(SyncError::Persistence)?;
        if !self.qualifies_to_run(last_change) {
            info!(
                prefix = %cycle.prefix(),
                last_change,
                "Profile settings changed recently, deferring sync"
            );
            let interval = self.update_interval().await?;
            return Ok(RunReport {
                outcome: RunOutcome::Deferred {
                    prefix: cycle.prefix().clone(),
                    last_change,
                },
                interval_secs: Some(interval),
            });
        }

        let outcome = self.run_batch(&cycle).await?;
        let interval = self.update_interval().await?;

        Ok(RunReport {
            outcome,
            interval_secs: Some(interval),
        })
    }

    async fn run_batch(&self, cycle: &CycleState) -> Result<RunOutcome, SyncError> {
        let prefix = cycle.prefix();

        match self
            .fetcher
            .execute(prefix, cycle.offset(), &self.settings.search_term)
            .await
        {
            Ok(report) if report.result.expects_more() => {
                let next = cycle.advanced_by(report.result.page_size);
                self.cycles
                    .set_cycle(&next)
                    .await
                    .map_err(SyncError::Persistence)?;
                info!(
                    prefix = %prefix,
                    offset = next.offset(),
                    "Full page fetched, advancing offset"
                );
                Ok(RunOutcome::Advanced {
                    prefix: prefix.clone(),
                    next_offset: next.offset(),
                    report,
                })
            }
            Ok(report) => {
                let next = self.determine_next_cycle(Some(prefix)).await?;
                info!(
                    prefix = %prefix,
                    fetched = report.result.fetched,
                    next = ?next.as_ref().map(ProfilePrefix::as_str),
                    "Profile paged through, moving to next profile"
                );
                Ok(RunOutcome::Retired {
                    prefix: prefix.clone(),
                    next,
                    report,
                })
            }
            Err(FetchError::Unavailable { prefix, source }) => {
                warn!(
                    prefix = %prefix,
                    error = %source,
                    "Directory unavailable, moving to next profile"
                );
                let next = self.determine_next_cycle(Some(&prefix)).await?;
                Ok(RunOutcome::Unavailable {
                    prefix,
                    next,
                    error: source.to_string(),
                })
            }
            Err(FetchError::Directory { prefix, source }) => {
                warn!(
                    prefix = %prefix,
                    error = %source,
                    "Directory rejected the request, moving to next profile"
                );
                let next = self.determine_next_cycle(Some(&prefix)).await?;
                Ok(RunOutcome::Rejected {
                    prefix,
                    next,
                    error: source.to_string(),
                })
            }
            Err(FetchError::InvalidSettings { prefix, source }) => {
                warn!(
                    prefix = %prefix,
                    error = %source,
                    "Profile settings unusable, moving to next profile"
                );
                let next = self.determine_next_cycle(Some(&prefix)).await?;
                Ok(RunOutcome::Rejected {
                    prefix,
                    next,
                    error: source.to_string(),
                })
            }
            Err(FetchError::Settings(e) | FetchError::Storage(e)) => {
                Err(SyncError::Persistence(e))
            }
        }
    }

    /// Starts a new cycle on the profile after `current`
    ///
    /// Persists `{next, 0}` and returns the chosen prefix, or returns `None`
    /// without writing anything when no profile is enabled.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Persistence` if the registry or the cycle cannot
    /// be read or written.
    pub async fn determine_next_cycle(
        &self,
        current: Option<&ProfilePrefix>,
    ) -> Result<Option<ProfilePrefix>, SyncError> {
        let profiles = self
            .registry
            .list_enabled_profiles()
            .await
            .map_err(SyncError::Persistence)?;

        let Some(next) = next_after(&profiles, current) else {
            return Ok(None);
        };

        self.cycles
            .set_cycle(&CycleState::start(next.clone()))
            .await
            .map_err(SyncError::Persistence)?;
        debug!(prefix = %next, "Started new cycle");
        Ok(Some(next))
    }

    /// Whether a profile last changed at `last_change` is out of cooldown
    #[must_use]
    pub fn qualifies_to_run(&self, last_change: i64) -> bool {
        let elapsed = self.clock.now().timestamp().saturating_sub(last_change);
        elapsed > i64::try_from(self.settings.cooldown_secs).unwrap_or(i64::MAX)
    }

    /// Recomputes the interval from the mapped population and persists it
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Persistence` if counts cannot be read or the
    /// interval cannot be written.
    pub async fn update_interval(&self) -> Result<u64, SyncError> {
        let mapped = self
            .identity_mapper
            .count_mapped()
            .await
            .map_err(SyncError::Persistence)?;
        let min_paging = self
            .cycles
            .get_min_paging_size()
            .await
            .map_err(SyncError::Persistence)?;

        let interval = recompute_interval(mapped, min_paging, &self.settings.bounds);
        self.cycles
            .set_interval(interval)
            .await
            .map_err(SyncError::Persistence)?;

        debug!(mapped, min_paging, interval, "Sync interval updated");
        Ok(interval)
    }

    /// Currently persisted interval
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Persistence` if the store cannot be read.
    pub async fn current_interval(&self) -> Result<u64, SyncError> {
        self.cycles
            .get_interval(&self.settings.bounds)
            .await
            .map_err(SyncError::Persistence)
    }

    /// Background job mode from the store, or the configured default
    async fn background_mode(&self) -> Result<BackgroundJobMode, SyncError> {
        let raw = self
            .store
            .get_value(CORE_NAMESPACE, BACKGROUND_JOBS_MODE_KEY)
            .await
            .map_err(SyncError::Persistence)?;

        Ok(match raw {
            Some(value) => value.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Unknown background job mode, using default");
                self.settings.default_mode
            }),
            None => self.settings.default_mode,
        })
    }

    /// Reads the scheduler state without changing it
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Persistence` if the store cannot be read.
    pub async fn status(&self) -> Result<SchedulerStatus, SyncError> {
        let mode = self.background_mode().await?;
        let enabled_profiles = self
            .registry
            .list_enabled_profiles()
            .await
            .map_err(SyncError::Persistence)?;
        let recorded_prefix = self
            .cycles
            .get_recorded_prefix()
            .await
            .map_err(SyncError::Persistence)?;
        let cycle = self.cycles.get_cycle().await.map_err(SyncError::Persistence)?;
        let interval_secs = self.current_interval().await?;
        let mapped_identities = self
            .identity_mapper
            .count_mapped()
            .await
            .map_err(SyncError::Persistence)?;
        let min_paging_size = self
            .cycles
            .get_min_paging_size()
            .await
            .map_err(SyncError::Persistence)?;

        Ok(SchedulerStatus {
            mode,
            enabled_profiles,
            recorded_prefix,
            cycle,
            interval_secs,
            mapped_identities,
            min_paging_size,
        })
    }
}
