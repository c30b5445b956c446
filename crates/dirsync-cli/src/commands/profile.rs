//! Profile command - Inspect and edit directory profiles
//!
//! Provides the `dirsync profile` CLI command which:
//! 1. Lists every configured profile with its enabled flag and mapped count
//! 2. Shows the stored settings of one profile
//! 3. Sets one profile setting and stamps the profile's last change time,
//!    which starts the sync cooldown for that profile

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use dirsync_core::{
    domain::{
        profile::{keys, APP_NAMESPACE},
        ProfilePrefix,
    },
    ports::IConfigStore,
};
use dirsync_sync::ProfileRegistry;
use tracing::info;

use super::{display_prefix, parse_prefix, CommandContext};

/// Value shown instead of the agent password
const MASKED: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// List configured profiles
    List,
    /// Show the settings of a profile
    Show {
        /// Profile prefix, `-` for the unprefixed first profile
        prefix: String,
    },
    /// Set a profile setting
    Set {
        /// Profile prefix, `-` for the unprefixed first profile
        prefix: String,
        /// Setting name (e.g., "ldap_host", "ldap_paging_size")
        key: String,
        /// New value
        value: String,
    },
}

impl ProfileCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ProfileCommand::List => self.execute_list(ctx).await,
            ProfileCommand::Show { prefix } => self.execute_show(ctx, prefix).await,
            ProfileCommand::Set { prefix, key, value } => {
                self.execute_set(ctx, prefix, key, value).await
            }
        }
    }

    async fn execute_list(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = ctx.load_config()?;
        let pool = ctx.open_database(&config).await?;

        let store: Arc<dyn IConfigStore + Send + Sync> = Arc::new(pool.config_store());
        let profiles = ProfileRegistry::new(store)
            .list_profiles()
            .await
            .context("Failed to list profiles")?;
        let mapped: HashMap<String, u64> = pool
            .identity_mapper()
            .count_per_profile()
            .await
            .context("Failed to count mapped identities")?
            .into_iter()
            .map(|c| (c.prefix, c.mapped))
            .collect();

        if ctx.is_json() {
            let entries: Vec<_> = profiles
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "prefix": p.prefix.as_str(),
                        "enabled": p.enabled,
                        "mapped": mapped.get(p.prefix.as_str()).copied().unwrap_or(0),
                    })
                })
                .collect();
            formatter.print_json(&serde_json::json!({ "profiles": entries }));
        } else if profiles.is_empty() {
            formatter.info("No profiles configured");
        } else {
            formatter.success(&format!("{} profile(s)", profiles.len()));
            for p in &profiles {
                let state = if p.enabled { "enabled" } else { "disabled" };
                let count = mapped.get(p.prefix.as_str()).copied().unwrap_or(0);
                formatter.field(
                    &display_prefix(&p.prefix),
                    &format!("{state}, {count} mapped"),
                );
            }
        }

        pool.close().await;
        Ok(())
    }

    async fn execute_show(&self, ctx: &CommandContext, raw_prefix: &str) -> Result<()> {
        let formatter = ctx.formatter();
        let prefix = parse_prefix(raw_prefix)?;
        let config = ctx.load_config()?;
        let pool = ctx.open_database(&config).await?;
        let store = pool.config_store();

        let settings = read_settings(&store, &prefix).await?;
        let last_change = store
            .get_value(APP_NAMESPACE, &prefix.key(keys::LAST_CHANGE))
            .await?
            .and_then(|v| v.trim().parse::<i64>().ok());
        pool.close().await;

        if settings.is_empty() {
            formatter.error(&format!("Profile {} not found", display_prefix(&prefix)));
            return Ok(());
        }

        if ctx.is_json() {
            let values: serde_json::Map<String, serde_json::Value> = settings
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                .collect();
            formatter.print_json(&serde_json::json!({
                "prefix": prefix.as_str(),
                "settings": values,
                "last_change": last_change,
            }));
        } else {
            formatter.success(&format!("Profile {}", display_prefix(&prefix)));
            for (key, value) in &settings {
                formatter.field(key, value);
            }
            let changed = last_change
                .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
                .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
            formatter.field("last change", &changed);
        }

        Ok(())
    }

    async fn execute_set(
        &self,
        ctx: &CommandContext,
        raw_prefix: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let formatter = ctx.formatter();
        let prefix = parse_prefix(raw_prefix)?;
        let config = ctx.load_config()?;
        let pool = ctx.open_database(&config).await?;
        let store = pool.config_store();

        let now = Utc::now().timestamp();
        let result = apply_setting(&store, &prefix, key, value, now).await;
        pool.close().await;

        match result {
            Ok(setting) => {
                info!(prefix = %prefix, key = setting, "Profile setting updated");
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "prefix": prefix.as_str(),
                        "key": setting,
                        "last_change": now,
                    }));
                } else {
                    let shown = if setting == keys::AGENT_PASSWORD { MASKED } else { value };
                    formatter.success(&format!(
                        "Set {} {} = {}",
                        display_prefix(&prefix),
                        setting,
                        shown
                    ));
                    formatter.info(&format!(
                        "Background sync of this profile pauses for {}",
                        super::status::format_interval(config.scheduler.cooldown_secs)
                    ));
                }
                Ok(())
            }
            Err(e) => {
                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": false,
                        "prefix": prefix.as_str(),
                        "key": key,
                        "error": format!("{e:#}"),
                    }));
                } else {
                    formatter.error(&format!("{e:#}"));
                    formatter.info("");
                    formatter.info("Supported settings:");
                    formatter.info(&format!("  {}", keys::CONFIGURATION_ACTIVE));
                    for k in keys::ALL {
                        formatter.info(&format!("  {k}"));
                    }
                }
                Ok(())
            }
        }
    }
}

/// Stored settings of a profile in display order, password masked
///
/// Empty when the profile has no stored setting at all.
pub async fn read_settings(
    store: &dyn IConfigStore,
    prefix: &ProfilePrefix,
) -> Result<Vec<(&'static str, String)>> {
    let mut settings = Vec::new();
    for key in std::iter::once(&keys::CONFIGURATION_ACTIVE).chain(keys::ALL.iter()) {
        let Some(value) = store.get_value(APP_NAMESPACE, &prefix.key(key)).await? else {
            continue;
        };
        let value = if *key == keys::AGENT_PASSWORD && !value.is_empty() {
            MASKED.to_string()
        } else {
            value
        };
        settings.push((*key, value));
    }
    Ok(settings)
}

/// Resolves a user-supplied setting name to its canonical key
fn resolve_setting(key: &str) -> Result<&'static str> {
    std::iter::once(&keys::CONFIGURATION_ACTIVE)
        .chain(keys::ALL.iter())
        .copied()
        .find(|k| k.eq_ignore_ascii_case(key))
        .with_context(|| format!("Unknown profile setting '{key}'"))
}

/// Checks values the scheduler interprets numerically or as flags
fn validate_setting(key: &str, value: &str) -> Result<()> {
    match key {
        k if k == keys::CONFIGURATION_ACTIVE => {
            if value != "0" && value != "1" {
                anyhow::bail!("{k} must be 0 or 1");
            }
        }
        k if k == keys::PORT => {
            value
                .parse::<u16>()
                .with_context(|| format!("{k} must be a port number"))?;
        }
        k if k == keys::PAGING_SIZE => {
            value
                .parse::<u64>()
                .with_context(|| format!("{k} must be a non-negative integer"))?;
        }
        _ => {}
    }
    Ok(())
}

/// Writes one profile setting together with the profile's change stamp
///
/// Both keys are written in one batch. Returns the canonical setting name.
pub async fn apply_setting(
    store: &dyn IConfigStore,
    prefix: &ProfilePrefix,
    key: &str,
    value: &str,
    now: i64,
) -> Result<&'static str> {
    let setting = resolve_setting(key)?;
    validate_setting(setting, value)?;

    let setting_key = prefix.key(setting);
    let stamp_key = prefix.key(keys::LAST_CHANGE);
    store
        .set_values(
            APP_NAMESPACE,
            &[
                (setting_key.as_str(), value.to_string()),
                (stamp_key.as_str(), now.to_string()),
            ],
        )
        .await
        .context("Failed to store profile setting")?;

    Ok(setting)
}
