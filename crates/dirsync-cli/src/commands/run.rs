//! Run command - Perform one background sync invocation now
//!
//! Provides the `dirsync run` CLI command which:
//! 1. Loads configuration and opens the database
//! 2. Wires the LDAP client into the sync cycle controller
//! 3. Runs exactly one invocation and reports what it did

use anyhow::{Context, Result};
use clap::Args;
use dirsync_sync::RunOutcome;
use tracing::info;

use super::{build_controller, display_prefix, CommandContext};

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Narrow the fetch with a search term instead of the configured one
    #[arg(long)]
    pub search: Option<String>,
}

impl RunCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();

        let mut config = ctx.load_config()?;
        if let Some(term) = &self.search {
            config.scheduler.search_term = term.clone();
        }

        let pool = ctx.open_database(&config).await?;
        let controller = build_controller(&pool, &config)?;

        info!("Running one sync invocation");
        let report = controller
            .run_once()
            .await
            .context("Sync invocation failed")?;

        if ctx.is_json() {
            let json = serde_json::to_value(&report).context("Failed to serialize run report")?;
            formatter.print_json(&json);
        } else {
            let message = describe_outcome(&report.outcome);
            if matches!(
                report.outcome,
                RunOutcome::Unavailable { .. } | RunOutcome::Rejected { .. }
            ) {
                formatter.warn(&message);
            } else {
                formatter.success(&message);
            }
            if let Some(secs) = report.interval_secs {
                formatter.field("Next run in", &super::status::format_interval(secs));
            }
        }

        pool.close().await;
        Ok(())
    }
}

/// One-line summary of an invocation outcome
pub fn describe_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Skipped { .. } => {
            "Background jobs are interactive (ajax), nothing to do".to_string()
        }
        RunOutcome::Idle { .. } => "No enabled directory profiles".to_string(),
        RunOutcome::Deferred { prefix, .. } => format!(
            "Profile {} changed recently, sync deferred",
            display_prefix(prefix)
        ),
        RunOutcome::Advanced {
            prefix,
            next_offset,
            report,
        } => format!(
            "Profile {}: {} fetched, {} applied, {} skipped, {} malformed; continuing at offset {}",
            display_prefix(prefix),
            report.result.fetched,
            report.applied,
            report.skipped,
            report.malformed,
            next_offset
        ),
        RunOutcome::Retired {
            prefix,
            next,
            report,
        } => format!(
            "Profile {} fully synced ({} fetched, {} applied); next: {}",
            display_prefix(prefix),
            report.result.fetched,
            report.applied,
            next.as_ref().map_or_else(|| "none".to_string(), display_prefix)
        ),
        RunOutcome::Unavailable {
            prefix,
            next,
            error,
        } => format!(
            "Directory of profile {} unavailable ({}); next: {}",
            display_prefix(prefix),
            error,
            next.as_ref().map_or_else(|| "none".to_string(), display_prefix)
        ),
        RunOutcome::Rejected {
            prefix,
            next,
            error,
        } => format!(
            "Profile {} could not be synced ({}); next: {}",
            display_prefix(prefix),
            error,
            next.as_ref().map_or_else(|| "none".to_string(), display_prefix)
        ),
    }
}
