//! Config command - View and manage dirsync configuration
//!
//! Provides the `dirsync config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use dirsync_core::{config::Config, domain::BackgroundJobMode};
use tracing::info;

use super::CommandContext;

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("scheduler.min_interval_secs", "Lower bound of the run interval"),
    ("scheduler.max_interval_secs", "Upper bound of the run interval"),
    ("scheduler.cooldown_secs", "Pause after a profile settings change"),
    ("scheduler.default_background_mode", "ajax|webcron|cron"),
    ("scheduler.search_term", "Term narrowing every fetch"),
    ("store.database", "SQLite database path"),
    ("directory.connect_timeout_secs", "Seconds to establish a connection"),
    ("directory.operation_timeout_secs", "Seconds per bind or search"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.json", "true|false"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "scheduler.cooldown_secs")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx).await,
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value).await,
            ConfigCommand::Validate => self.execute_validate(ctx).await,
        }
    }

    async fn execute_show(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;
        let config = ctx.load_config()?;

        info!(config_path = %config_path.display(), "Showing configuration");

        if ctx.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;

            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    async fn execute_set(&self, ctx: &CommandContext, key: &str, value: &str) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;
        let mut config = ctx.load_config()?;

        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for (name, description) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {name:<36} - {description}"));
                }
            }
            return Ok(());
        }

        let validation_errors = config.validate();
        if !validation_errors.is_empty() {
            let error_msgs: Vec<String> = validation_errors.iter().map(|e| e.to_string()).collect();

            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": error_msgs,
                }));
            } else {
                formatter.error(&format!(
                    "Invalid value for '{}': {}",
                    key,
                    error_msgs.join("; ")
                ));
            }
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
        }

        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        std::fs::write(config_path, &yaml).context("Failed to write configuration file")?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {} = {}", key, value));
            formatter.info(&format!("Saved to {}", config_path.display()));
        }

        Ok(())
    }

    async fn execute_validate(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;

        // Load explicitly so a missing file is reported rather than defaulted
        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                if !config_path.exists() {
                    if ctx.is_json() {
                        formatter.print_json(&serde_json::json!({
                            "valid": false,
                            "config_path": config_path.display().to_string(),
                            "errors": ["Configuration file not found. Using defaults."],
                        }));
                    } else {
                        formatter.info(&format!(
                            "Configuration file not found at {}",
                            config_path.display()
                        ));
                        formatter.info(
                            "Using default configuration. Run 'dirsync config set <key> <value>' to create one.",
                        );
                    }
                    return Ok(());
                }

                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [format!("{e:#}")],
                    }));
                } else {
                    formatter.error(&format!("{e:#}"));
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();

        if ctx.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .with_context(|| format!("Expected a non-negative integer for {key}"))
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- scheduler ---
        "scheduler.min_interval_secs" => {
            config.scheduler.min_interval_secs = parse_secs(key, value)?;
        }
        "scheduler.max_interval_secs" => {
            config.scheduler.max_interval_secs = parse_secs(key, value)?;
        }
        "scheduler.cooldown_secs" => {
            config.scheduler.cooldown_secs = parse_secs(key, value)?;
        }
        "scheduler.default_background_mode" => {
            config.scheduler.default_background_mode = value
                .parse::<BackgroundJobMode>()
                .context("Expected one of ajax, webcron, cron")?;
        }
        "scheduler.search_term" => {
            config.scheduler.search_term = value.to_string();
        }

        // --- store ---
        "store.database" => {
            config.store.database = PathBuf::from(value);
        }

        // --- directory ---
        "directory.connect_timeout_secs" => {
            config.directory.connect_timeout_secs = parse_secs(key, value)?;
        }
        "directory.operation_timeout_secs" => {
            config.directory.operation_timeout_secs = parse_secs(key, value)?;
        }

        // --- logging ---
        "logging.level" => {
            config.logging.level = value.to_string();
        }
        "logging.json" => {
            config.logging.json = value
                .parse::<bool>()
                .context("Expected true or false for logging.json")?;
        }

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_scheduler_intervals() {
        let mut config = Config::default();
        apply_config_value(&mut config, "scheduler.min_interval_secs", "600").unwrap();
        apply_config_value(&mut config, "scheduler.max_interval_secs", "7200").unwrap();
        assert_eq!(config.scheduler.min_interval_secs, 600);
        assert_eq!(config.scheduler.max_interval_secs, 7200);
    }

    #[test]
    fn test_apply_scheduler_cooldown() {
        let mut config = Config::default();
        apply_config_value(&mut config, "scheduler.cooldown_secs", "0").unwrap();
        assert_eq!(config.scheduler.cooldown_secs, 0);
    }

    #[test]
    fn test_apply_background_mode() {
        let mut config = Config::default();
        apply_config_value(&mut config, "scheduler.default_background_mode", "webcron").unwrap();
        assert_eq!(
            config.scheduler.default_background_mode,
            BackgroundJobMode::Webcron
        );
        assert!(
            apply_config_value(&mut config, "scheduler.default_background_mode", "hourly").is_err()
        );
    }

    #[test]
    fn test_apply_search_term() {
        let mut config = Config::default();
        apply_config_value(&mut config, "scheduler.search_term", "smith").unwrap();
        assert_eq!(config.scheduler.search_term, "smith");
    }

    #[test]
    fn test_apply_store_database() {
        let mut config = Config::default();
        apply_config_value(&mut config, "store.database", "/var/lib/dirsync/state.db").unwrap();
        assert_eq!(
            config.store.database,
            PathBuf::from("/var/lib/dirsync/state.db")
        );
    }

    #[test]
    fn test_apply_directory_timeouts() {
        let mut config = Config::default();
        apply_config_value(&mut config, "directory.connect_timeout_secs", "3").unwrap();
        apply_config_value(&mut config, "directory.operation_timeout_secs", "30").unwrap();
        assert_eq!(config.directory.connect_timeout_secs, 3);
        assert_eq!(config.directory.operation_timeout_secs, 30);
    }

    #[test]
    fn test_apply_logging() {
        let mut config = Config::default();
        apply_config_value(&mut config, "logging.level", "debug").unwrap();
        apply_config_value(&mut config, "logging.json", "true").unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_apply_unknown_key_fails() {
        let mut config = Config::default();
        let result = apply_config_value(&mut config, "unknown.key", "value");
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_negative_number_fails() {
        let mut config = Config::default();
        let result = apply_config_value(&mut config, "scheduler.cooldown_secs", "-5");
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_then_validate_catches_inverted_bounds() {
        let mut config = Config::default();
        apply_config_value(&mut config, "scheduler.min_interval_secs", "50000").unwrap();
        assert!(config
            .validate()
            .iter()
            .any(|e| e.field == "scheduler.max_interval_secs"));
    }

    #[test]
    fn test_supported_keys_all_apply() {
        for (key, _) in SUPPORTED_KEYS {
            let value = match *key {
                "scheduler.default_background_mode" => "cron",
                "logging.json" => "false",
                "logging.level" => "info",
                "scheduler.search_term" | "store.database" => "x",
                _ => "60",
            };
            let mut config = Config::default();
            assert!(
                apply_config_value(&mut config, key, value).is_ok(),
                "{key} should be settable"
            );
        }
    }
}
