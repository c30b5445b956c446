//! CLI subcommands and the context they share

pub mod config;
pub mod profile;
pub mod run;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use dirsync_cache::DatabasePool;
use dirsync_core::{
    config::Config,
    domain::ProfilePrefix,
    ports::{IClock, IConfigStore, IDirectoryClient, IIdentityMapper, SystemClock},
};
use dirsync_ldap::LdapDirectoryClient;
use dirsync_sync::{ControllerSettings, SyncCycleController};
use tracing::{debug, info};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global options every command runs with
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub format: OutputFormat,
    pub quiet: bool,
    /// Configuration file, `--config` or the default location
    pub config_path: PathBuf,
}

impl CommandContext {
    pub fn new(format: OutputFormat, quiet: bool, config_path: Option<PathBuf>) -> Self {
        Self {
            format,
            quiet,
            config_path: config_path.unwrap_or_else(Config::default_path),
        }
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Loads the configuration file
    ///
    /// A missing file yields the defaults; an unreadable or invalid one is
    /// an error.
    pub fn load_config(&self) -> Result<Config> {
        if !self.config_path.exists() {
            debug!(config_path = %self.config_path.display(), "No configuration file, using defaults");
            return Ok(Config::default());
        }
        let config = Config::load(&self.config_path)?;
        info!(config_path = %self.config_path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Opens the database named by the configuration
    pub async fn open_database(&self, config: &Config) -> Result<DatabasePool> {
        DatabasePool::new(&config.store.database)
            .await
            .with_context(|| {
                format!("Failed to open database {}", config.store.database.display())
            })
    }
}

/// Wires a controller over an open database with the LDAP client
pub fn build_controller(pool: &DatabasePool, config: &Config) -> Result<SyncCycleController> {
    let directory: Arc<dyn IDirectoryClient + Send + Sync> =
        Arc::new(LdapDirectoryClient::from_config(&config.directory));
    controller_with_directory(pool, directory, config)
}

/// Wires a controller over an open database and the given directory client
pub fn controller_with_directory(
    pool: &DatabasePool,
    directory: Arc<dyn IDirectoryClient + Send + Sync>,
    config: &Config,
) -> Result<SyncCycleController> {
    let settings = ControllerSettings::from_config(&config.scheduler)
        .context("Invalid scheduler configuration")?;
    let store: Arc<dyn IConfigStore + Send + Sync> = Arc::new(pool.config_store());
    let identity_mapper: Arc<dyn IIdentityMapper + Send + Sync> = Arc::new(pool.identity_mapper());
    let clock: Arc<dyn IClock> = Arc::new(SystemClock);

    Ok(SyncCycleController::new(
        directory,
        identity_mapper,
        store,
        clock,
        settings,
    ))
}

/// Shows a prefix for humans; the unprefixed first profile reads as `(default)`
pub fn display_prefix(prefix: &ProfilePrefix) -> String {
    if prefix.as_str().is_empty() {
        "(default)".to_string()
    } else {
        prefix.to_string()
    }
}

/// Parses a prefix given on the command line
///
/// `-` stands for the unprefixed first profile, since an empty argument is
/// awkward to type.
pub fn parse_prefix(raw: &str) -> Result<ProfilePrefix> {
    let raw = if raw == "-" { "" } else { raw };
    ProfilePrefix::new(raw.to_string()).with_context(|| format!("Invalid profile prefix '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        assert_eq!(display_prefix(&parse_prefix("s01").unwrap()), "s01");
        assert_eq!(display_prefix(&parse_prefix("-").unwrap()), "(default)");
    }

    #[test]
    fn test_parse_prefix_rejects_whitespace() {
        assert!(parse_prefix("s 01").is_err());
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CommandContext::new(
            OutputFormat::Human,
            false,
            Some(dir.path().join("absent.yaml")),
        );
        assert_eq!(ctx.load_config().unwrap(), Config::default());
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "scheduler:\n  cooldown_secs: 60\n").unwrap();

        let ctx = CommandContext::new(OutputFormat::Json, false, Some(path));
        let config = ctx.load_config().unwrap();
        assert_eq!(config.scheduler.cooldown_secs, 60);
        assert!(ctx.is_json());
    }

    #[test]
    fn test_load_config_invalid_yaml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "scheduler: [not, a, map]\n").unwrap();

        let ctx = CommandContext::new(OutputFormat::Human, false, Some(path));
        assert!(ctx.load_config().is_err());
    }
}
