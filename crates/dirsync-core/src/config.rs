//! Configuration module for dirsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//!
//! Scheduler progress (current profile, offset, interval) is not part of this
//! file; it lives in the key/value store so it survives restarts atomically.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::{
    interval::{DEFAULT_MAX_INTERVAL_SECS, DEFAULT_MIN_INTERVAL_SECS},
    BackgroundJobMode, IntervalBounds,
};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for dirsync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub store: StoreConfig,
    pub directory: DirectoryConfig,
    pub logging: LoggingConfig,
}

/// Background sync scheduling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Lower bound of the adaptive run interval, in seconds.
    pub min_interval_secs: u64,
    /// Upper bound of the adaptive run interval, in seconds.
    pub max_interval_secs: u64,
    /// A profile whose settings changed within this many seconds is not synced.
    pub cooldown_secs: u64,
    /// Mode assumed when the store holds no `core/backgroundjobs_mode` value.
    pub default_background_mode: BackgroundJobMode,
    /// Free-text term narrowing every fetch; empty fetches the whole population.
    pub search_term: String,
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the SQLite database holding settings, state and identities.
    pub database: PathBuf,
}

/// Directory connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Seconds allowed to establish a connection.
    pub connect_timeout_secs: u64,
    /// Seconds allowed for a single bind or search.
    pub operation_timeout_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/dirsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("dirsync")
            .join("config.yaml")
    }
}

impl SchedulerConfig {
    /// Interval bounds described by this section.
    ///
    /// # Errors
    ///
    /// Fails when the bounds are inconsistent; [`Config::validate`] reports
    /// the same condition.
    pub fn interval_bounds(&self) -> Result<IntervalBounds, crate::domain::DomainError> {
        IntervalBounds::new(self.min_interval_secs, self.max_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: DEFAULT_MIN_INTERVAL_SECS,
            max_interval_secs: DEFAULT_MAX_INTERVAL_SECS,
            cooldown_secs: 1800,
            default_background_mode: BackgroundJobMode::Cron,
            search_term: String::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("dirsync");
        Self {
            database: data_dir.join("dirsync.db"),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            operation_timeout_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"scheduler.min_interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- scheduler ---
        if self.scheduler.min_interval_secs == 0 {
            errors.push(ValidationError {
                field: "scheduler.min_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.scheduler.min_interval_secs > self.scheduler.max_interval_secs {
            errors.push(ValidationError {
                field: "scheduler.max_interval_secs".into(),
                message: format!(
                    "max_interval_secs ({}) must not be below min_interval_secs ({})",
                    self.scheduler.max_interval_secs, self.scheduler.min_interval_secs
                ),
            });
        }

        // --- store ---
        if self.store.database.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "store.database".into(),
                message: "must not be empty".into(),
            });
        }

        // --- directory ---
        if self.directory.connect_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "directory.connect_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.directory.operation_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "directory.operation_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use dirsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .store_database(PathBuf::from("/var/lib/dirsync/dirsync.db"))
///     .scheduler_cooldown_secs(600)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- scheduler ---

    pub fn scheduler_min_interval_secs(mut self, seconds: u64) -> Self {
        self.config.scheduler.min_interval_secs = seconds;
        self
    }

    pub fn scheduler_max_interval_secs(mut self, seconds: u64) -> Self {
        self.config.scheduler.max_interval_secs = seconds;
        self
    }

    pub fn scheduler_cooldown_secs(mut self, seconds: u64) -> Self {
        self.config.scheduler.cooldown_secs = seconds;
        self
    }

    pub fn scheduler_default_background_mode(mut self, mode: BackgroundJobMode) -> Self {
        self.config.scheduler.default_background_mode = mode;
        self
    }

    pub fn scheduler_search_term(mut self, term: impl Into<String>) -> Self {
        self.config.scheduler.search_term = term.into();
        self
    }

    // --- store ---

    pub fn store_database(mut self, path: PathBuf) -> Self {
        self.config.store.database = path;
        self
    }

    // --- directory ---

    pub fn directory_connect_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.directory.connect_timeout_secs = seconds;
        self
    }

    pub fn directory_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.directory.operation_timeout_secs = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
