//! Command-line interface definitions for the exporter.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. The settings path can also be provided through the environment.

use crate::config::DEFAULT_CONFIG_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the exporter.
///
/// # Examples
///
/// ```sh
/// # Rebuild the whole tree and the manifest now
/// llms_export regenerate
///
/// # Refresh only posts
/// llms_export category post
///
/// # Regenerate pages weekly
/// llms_export schedule set page weekly
///
/// # Run the scheduler, checking every 5 minutes
/// llms_export --config /etc/llms_export.yaml daemon --tick-secs 300
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the settings file
    #[arg(short, long, env = "LLMS_EXPORT_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Operator actions.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Delete the output tree, export every public category, rewrite the manifest
    Regenerate,

    /// Export one category over the existing tree (manifest untouched)
    Category {
        /// Category name, e.g. `post`
        name: String,
    },

    /// Show or change regeneration schedules
    #[command(subcommand)]
    Schedule(ScheduleCommand),

    /// Run scheduled regenerations until interrupted; SIGHUP forces a full run
    Daemon {
        /// Seconds between schedule checks
        #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
        tick_secs: u64,
    },
}

/// Schedule subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ScheduleCommand {
    /// Print the effective interval of every public category
    Show,

    /// Set one category's interval
    Set {
        /// Category name
        category: String,
        /// One of: none, hourly, twicedaily, daily, weekly, monthly
        interval: String,
    },

    /// Override every category with one interval
    SetAll {
        /// One of: none, hourly, twicedaily, daily, weekly, monthly
        interval: String,
    },

    /// Remove the global override
    ClearAll,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_regenerate_with_default_config() {
        let cli = Cli::parse_from(["llms_export", "regenerate"]);
        assert_eq!(cli.command, Command::Regenerate);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn test_cli_short_config_flag() {
        let cli = Cli::parse_from(["llms_export", "-c", "/etc/llms.yaml", "category", "post"]);
        assert_eq!(cli.config, PathBuf::from("/etc/llms.yaml"));
        assert_eq!(
            cli.command,
            Command::Category {
                name: "post".to_string()
            }
        );
    }

    #[test]
    fn test_cli_schedule_set() {
        let cli = Cli::parse_from(["llms_export", "schedule", "set", "page", "twicedaily"]);
        assert_eq!(
            cli.command,
            Command::Schedule(ScheduleCommand::Set {
                category: "page".to_string(),
                interval: "twicedaily".to_string(),
            })
        );
    }

    #[test]
    fn test_cli_schedule_set_all_and_clear() {
        let cli = Cli::parse_from(["llms_export", "schedule", "set-all", "none"]);
        assert_eq!(
            cli.command,
            Command::Schedule(ScheduleCommand::SetAll {
                interval: "none".to_string()
            })
        );
        let cli = Cli::parse_from(["llms_export", "schedule", "clear-all"]);
        assert_eq!(cli.command, Command::Schedule(ScheduleCommand::ClearAll));
    }

    #[test]
    fn test_cli_daemon_tick() {
        let cli = Cli::parse_from(["llms_export", "daemon"]);
        assert_eq!(cli.command, Command::Daemon { tick_secs: 60 });
        let cli = Cli::parse_from(["llms_export", "daemon", "--tick-secs", "5"]);
        assert_eq!(cli.command, Command::Daemon { tick_secs: 5 });
        assert!(Cli::try_parse_from(["llms_export", "daemon", "--tick-secs", "0"]).is_err());
    }
}
