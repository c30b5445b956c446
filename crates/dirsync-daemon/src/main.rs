//! dirsync Daemon - Background directory synchronization service
//!
//! This binary runs as a systemd service and handles:
//! - One sync invocation per wake-up, paging through enabled profiles
//! - Sleeping for the self-tuned interval persisted by the controller
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon opens the SQLite store, wires the LDAP client into a
//! [`SyncCycleController`] and enters a loop that runs one invocation and
//! then waits for the persisted interval. The wait is controlled by a
//! `CancellationToken` that is triggered on receipt of SIGTERM or SIGINT.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use dirsync_cache::DatabasePool;
use dirsync_core::{
    config::{Config, LoggingConfig},
    ports::{IClock, IConfigStore, IDirectoryClient, IIdentityMapper, SystemClock},
};
use dirsync_ldap::LdapDirectoryClient;
use dirsync_sync::{ControllerSettings, RunOutcome, RunReport, SyncCycleController};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// DaemonService
// ============================================================================

/// Background service hosting the sync cycle controller
struct DaemonService {
    controller: SyncCycleController,
    /// Kept to close the pool on shutdown
    db_pool: DatabasePool,
    /// Wait after an invocation whose interval could not be read
    retry_delay: Duration,
    /// Token for signalling graceful shutdown
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the store and wires the controller from configuration
    async fn new(config: &Config, shutdown: CancellationToken) -> Result<Self> {
        let settings = ControllerSettings::from_config(&config.scheduler)
            .context("Invalid scheduler configuration")?;

        let db_pool = DatabasePool::new(&config.store.database)
            .await
            .with_context(|| {
                format!("Failed to open database {}", config.store.database.display())
            })?;
        info!(database = %config.store.database.display(), "Opened database");

        let directory: Arc<dyn IDirectoryClient + Send + Sync> =
            Arc::new(LdapDirectoryClient::from_config(&config.directory));

        Ok(Self::with_directory(db_pool, directory, settings, shutdown))
    }

    /// Wires the controller around an already opened store
    fn with_directory(
        db_pool: DatabasePool,
        directory: Arc<dyn IDirectoryClient + Send + Sync>,
        settings: ControllerSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let store: Arc<dyn IConfigStore + Send + Sync> = Arc::new(db_pool.config_store());
        let identity_mapper: Arc<dyn IIdentityMapper + Send + Sync> =
            Arc::new(db_pool.identity_mapper());
        let clock: Arc<dyn IClock> = Arc::new(SystemClock);
        let retry_delay = Duration::from_secs(settings.bounds.min_secs());

        let controller = SyncCycleController::new(directory, identity_mapper, store, clock, settings);

        Self {
            controller,
            db_pool,
            retry_delay,
            shutdown,
        }
    }

    /// Runs the invocation loop until shutdown is requested
    async fn run(&self) -> Result<()> {
        info!("Starting sync loop");

        loop {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested before invocation");
                break;
            }

            let wait = self.run_invocation().await;
            debug!(wait_secs = wait.as_secs(), "Waiting for next invocation");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.db_pool.close().await;
        info!("Sync loop terminated");
        Ok(())
    }

    /// Runs one controller invocation and returns how long to wait afterwards
    ///
    /// Failures are logged, never fatal: the next wake-up retries.
    async fn run_invocation(&self) -> Duration {
        match self.controller.run_once().await {
            Ok(report) => log_report(&report),
            Err(e) => error!(error = %format!("{e:#}"), "Sync invocation failed"),
        }

        match self.controller.current_interval().await {
            Ok(secs) => Duration::from_secs(secs),
            Err(e) => {
                warn!(
                    error = %e,
                    retry_secs = self.retry_delay.as_secs(),
                    "Could not read run interval"
                );
                self.retry_delay
            }
        }
    }
}

/// Logs the outcome of an invocation with structured fields
fn log_report(report: &RunReport) {
    let outcome_json = serde_json::to_string(&report.outcome).unwrap_or_default();
    debug!(outcome = %outcome_json, "Invocation report");

    match &report.outcome {
        RunOutcome::Skipped { reason } => {
            debug!(reason = ?reason, "Invocation skipped");
        }
        RunOutcome::Idle { reason } => {
            info!(reason = ?reason, interval_secs = ?report.interval_secs, "Nothing to sync");
        }
        RunOutcome::Deferred {
            prefix,
            last_change,
        } => {
            info!(prefix = %prefix, last_change, "Profile settings changed recently, deferring");
        }
        RunOutcome::Advanced {
            prefix,
            next_offset,
            report: batch,
        } => {
            info!(
                prefix = %prefix,
                next_offset,
                fetched = batch.result.fetched,
                applied = batch.applied,
                skipped = batch.skipped,
                malformed = batch.malformed,
                interval_secs = ?report.interval_secs,
                "Page applied"
            );
        }
        RunOutcome::Retired {
            prefix,
            next,
            report: batch,
        } => {
            info!(
                prefix = %prefix,
                next = ?next.as_ref().map(|p| p.as_str()),
                fetched = batch.result.fetched,
                applied = batch.applied,
                interval_secs = ?report.interval_secs,
                "Profile fully synced"
            );
        }
        RunOutcome::Unavailable {
            prefix,
            next,
            error,
        } => {
            warn!(
                prefix = %prefix,
                next = ?next.as_ref().map(|p| p.as_str()),
                error = %error,
                "Directory unavailable, moving on"
            );
        }
        RunOutcome::Rejected {
            prefix,
            next,
            error,
        } => {
            warn!(
                prefix = %prefix,
                next = ?next.as_ref().map(|p| p.as_str()),
                error = %error,
                "Profile could not be synced, moving on"
            );
        }
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

/// Builds the log filter: `RUST_LOG` wins over the configured level
fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(logging))
        .with_target(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::default_path();
    let config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    init_tracing(&config.logging);
    info!(config_path = %config_path.display(), "dirsync daemon starting (dirsyncd)");

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!(field = %e.field, message = %e.message, "Invalid configuration");
        }
        anyhow::bail!("configuration has {} error(s)", errors.len());
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(&config, shutdown_token.clone()).await?;

    let result = service.run().await;

    match &result {
        Ok(()) => info!("dirsync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "dirsync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use dirsync_core::domain::profile::{BACKGROUND_JOBS_MODE_KEY, CORE_NAMESPACE};

    use super::*;

    async fn service(token: CancellationToken) -> (DaemonService, DatabasePool) {
        let db = DatabasePool::in_memory().await.unwrap();
        let directory: Arc<dyn IDirectoryClient + Send + Sync> = Arc::new(
            LdapDirectoryClient::new(Duration::from_millis(200), Duration::from_millis(200)),
        );
        let service =
            DaemonService::with_directory(db.clone(), directory, ControllerSettings::default(), token);
        (service, db)
    }

    #[test]
    fn test_cancellation_token_child_propagation() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        assert!(!child.is_cancelled());

        parent.cancel();

        assert!(parent.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_config_default_path_exists() {
        let path = Config::default_path();
        assert!(!path.as_os_str().is_empty());
    }

    #[tokio::test]
    async fn test_retry_delay_is_lower_bound() {
        let (service, _db) = service(CancellationToken::new()).await;
        assert_eq!(service.retry_delay, Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn test_run_exits_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let (service, _db) = service(token).await;

        tokio::time::timeout(Duration::from_secs(5), service.run())
            .await
            .expect("run should return promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn test_idle_invocation_persists_max_interval() {
        let (service, db) = service(CancellationToken::new()).await;

        // No enabled profile and no paging sizes: the interval backs off fully.
        let wait = service.run_invocation().await;
        assert_eq!(wait, Duration::from_secs(43200));

        let stored = db
            .config_store()
            .get_value("user_ldap", "background_sync_interval")
            .await
            .unwrap();
        assert_eq!(stored.as_deref(), Some("43200"));
    }

    #[tokio::test]
    async fn test_unusable_profile_waits_computed_interval() {
        let (service, db) = service(CancellationToken::new()).await;
        let store = db.config_store();
        store
            .set_value("user_ldap", "ldap_configuration_active", "1")
            .await
            .unwrap();
        store
            .set_value("user_ldap", "ldap_paging_size", "lots")
            .await
            .unwrap();

        // The interval is still retuned when the profile cannot be synced.
        let wait = service.run_invocation().await;
        assert_eq!(wait, Duration::from_secs(43200));
    }

    #[tokio::test]
    async fn test_interactive_mode_waits_current_interval() {
        let (service, db) = service(CancellationToken::new()).await;
        db.config_store()
            .set_value(CORE_NAMESPACE, BACKGROUND_JOBS_MODE_KEY, "ajax")
            .await
            .unwrap();

        let wait = service.run_invocation().await;
        assert_eq!(wait, Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel_while_waiting() {
        let token = CancellationToken::new();
        let (service, _db) = service(token.clone()).await;

        let handle = tokio::spawn(async move { service.run().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("run should stop after cancel")
            .unwrap()
            .unwrap();
    }
}
