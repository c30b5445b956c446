//! Status command - Show background sync state
//!
//! Provides the `dirsync status` CLI command which reads, without changing
//! anything, the scheduling mode, the enabled profiles, the cycle in
//! progress, the current run interval and the mapped identity counts.

use anyhow::{Context, Result};
use clap::Args;
use dirsync_cache::ProfileMappingCount;
use dirsync_sync::SchedulerStatus;
use tracing::info;

use super::{build_controller, display_prefix, CommandContext};
use crate::output::OutputFormatter;

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();

        let config = ctx.load_config()?;
        let pool = ctx.open_database(&config).await?;
        let controller = build_controller(&pool, &config)?;

        let status = controller
            .status()
            .await
            .context("Failed to read scheduler state")?;
        let per_profile = pool
            .identity_mapper()
            .count_per_profile()
            .await
            .context("Failed to count mapped identities")?;

        info!(
            enabled = status.enabled_profiles.len(),
            mapped = status.mapped_identities,
            "Read scheduler status"
        );

        if ctx.is_json() {
            let json = serde_json::json!({
                "scheduler": serde_json::to_value(&status)
                    .context("Failed to serialize status")?,
                "mapped_per_profile": serde_json::to_value(&per_profile)
                    .context("Failed to serialize mapping counts")?,
                "database": config.store.database.display().to_string(),
            });
            formatter.print_json(&json);
        } else {
            print_status(formatter.as_ref(), &status, &per_profile);
        }

        pool.close().await;
        Ok(())
    }
}

fn print_status(
    formatter: &dyn OutputFormatter,
    status: &SchedulerStatus,
    per_profile: &[ProfileMappingCount],
) {
    formatter.success("Directory sync status");
    formatter.info("");

    formatter.field("Background mode", status.mode.as_str());
    if !status.mode.is_autonomous() {
        formatter.warn("Background jobs are interactive; directory sync does not run");
    }

    let enabled = if status.enabled_profiles.is_empty() {
        "none".to_string()
    } else {
        status
            .enabled_profiles
            .iter()
            .map(display_prefix)
            .collect::<Vec<_>>()
            .join(", ")
    };
    formatter.field("Enabled profiles", &enabled);

    let cycle = match (&status.cycle, &status.recorded_prefix) {
        (Some(cycle), _) => format!(
            "{} at offset {}",
            display_prefix(cycle.prefix()),
            cycle.offset()
        ),
        (None, Some(stale)) => format!("none ({} no longer enabled)", display_prefix(stale)),
        (None, None) => "none".to_string(),
    };
    formatter.field("Cycle in progress", &cycle);

    formatter.field("Run interval", &format_interval(status.interval_secs));
    formatter.field("Smallest page size", &status.min_paging_size.to_string());
    formatter.field("Mapped identities", &status.mapped_identities.to_string());

    for count in per_profile {
        let label = if count.prefix.is_empty() {
            "  (default)".to_string()
        } else {
            format!("  {}", count.prefix)
        };
        formatter.field(&label, &count.mapped.to_string());
    }
}

/// Renders seconds as hours and minutes, e.g. `2h 24m`
pub fn format_interval(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    match (hours, minutes, seconds) {
        (0, 0, s) => format!("{s}s"),
        (0, m, 0) => format!("{m}m"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, 0, 0) => format!("{h}h"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(45), "45s");
        assert_eq!(format_interval(1800), "30m");
        assert_eq!(format_interval(90), "1m 30s");
        assert_eq!(format_interval(8640), "2h 24m");
        assert_eq!(format_interval(43200), "12h");
    }
}
