//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for reportflow using clap.
//!
//! Exit codes: 0 success, 2 configuration error, 4 connection error,
//! 5 fatal error.

pub mod commands;

use clap::{Parser, Subcommand};

/// Reportflow - refresh gating, scheduled extraction and export orchestration
#[derive(Parser, Debug)]
#[command(name = "reportflow")]
#[command(version, about, long_about = None)]
#[command(author = "Reportflow Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "reportflow.toml", env = "REPORTFLOW_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "REPORTFLOW_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show which scheduled reports are due
    Plan(commands::plan::PlanArgs),

    /// Inspect and drive tenant refresh state
    Refresh(commands::refresh::RefreshArgs),

    /// Summarize export jobs
    Jobs(commands::jobs::JobsArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::refresh::RefreshCommand;

    #[test]
    fn test_cli_parse_plan() {
        let cli = Cli::parse_from(["reportflow", "plan"]);
        assert_eq!(cli.config, "reportflow.toml");
        assert!(matches!(cli.command, Commands::Plan(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["reportflow", "--config", "custom.toml", "jobs"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["reportflow", "--log-level", "debug", "plan"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_refresh_begin() {
        let cli = Cli::parse_from([
            "reportflow",
            "refresh",
            "begin",
            "--platform",
            "acme",
            "--track",
            "on-demand",
        ]);
        let Commands::Refresh(args) = cli.command else {
            panic!("expected refresh command");
        };
        assert!(matches!(args.command, RefreshCommand::Begin { .. }));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["reportflow", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["reportflow", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
