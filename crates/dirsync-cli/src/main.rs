//! dirsync CLI - Command-line interface for dirsync
//!
//! Provides commands for:
//! - Running one background sync invocation on demand
//! - Viewing scheduler status
//! - Listing, inspecting and editing directory profiles
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    config::ConfigCommand, profile::ProfileCommand, run::RunCommand, status::StatusCommand,
    CommandContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "dirsync",
    version,
    about = "Adaptive background sync of LDAP user directories"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one background sync invocation now
    Run(RunCommand),
    /// Show background sync status
    Status(StatusCommand),
    /// Inspect and edit directory profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Log filter for the given `-v` count
fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(cli.verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CommandContext::new(format, cli.quiet, cli.config);

    match cli.command {
        Commands::Run(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Profile(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_profile_set_with_global_flags() {
        let cli = Cli::try_parse_from([
            "dirsync",
            "profile",
            "set",
            "s01",
            "ldap_host",
            "ldap.example.com",
            "--json",
            "--config",
            "/tmp/dirsync.yaml",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/dirsync.yaml")));
        match cli.command {
            Commands::Profile(ProfileCommand::Set { prefix, key, value }) => {
                assert_eq!(prefix, "s01");
                assert_eq!(key, "ldap_host");
                assert_eq!(value, "ldap.example.com");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_run_with_search_and_verbosity() {
        let cli = Cli::try_parse_from(["dirsync", "-vv", "run", "--search", "smith"]).unwrap();
        assert_eq!(verbosity_filter(cli.verbose), "debug");
        match cli.command {
            Commands::Run(cmd) => assert_eq!(cmd.search.as_deref(), Some("smith")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_profile_requires_subcommand() {
        assert!(Cli::try_parse_from(["dirsync", "profile"]).is_err());
    }
}
