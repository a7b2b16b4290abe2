//! CLI command definitions using clap.
//!
//! - serve: HTTP trigger surface, optionally with the interval timer
//! - run-loop: one iteration in the foreground
//! - strategize / escalate: the manual triggers
//! - status / failures / retain: inspection and maintenance

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Kaizen - a self-improving loop that learns from failed commands
#[derive(Parser, Debug)]
#[command(name = "kaizen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    pub stderr_log: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Serve the HTTP trigger surface and the dashboard
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,

        /// Request a loop every N seconds (0 disables the timer)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Run one loop iteration in the foreground
    RunLoop,

    /// Ask the strategist for a new mission
    Strategize,

    /// Invoke the self-repair agent
    Escalate {
        /// Trigger reason passed to the agent
        #[arg(short, long, default_value = "manual_trigger")]
        reason: String,
    },

    /// Show the persisted status record
    Status,

    /// Print the known failure patterns
    Failures,

    /// Apply both retention rules once
    Retain,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["kaizen"]).is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["kaizen", "status", "-v", "-c", "/etc/kaizen.yml", "--stderr-log"]).unwrap();
        assert!(cli.is_verbose());
        assert!(cli.stderr_log);
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/etc/kaizen.yml")));
        assert_eq!(cli.command, Commands::Status);
    }

    #[test]
    fn test_serve_options() {
        let cli = Cli::try_parse_from(["kaizen", "serve"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Serve {
                port: None,
                interval: None
            }
        );

        let cli = Cli::try_parse_from(["kaizen", "serve", "-p", "8080", "-i", "300"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Serve {
                port: Some(8080),
                interval: Some(300)
            }
        );
    }

    #[test]
    fn test_run_loop_command() {
        let cli = Cli::try_parse_from(["kaizen", "run-loop"]).unwrap();
        assert_eq!(cli.command, Commands::RunLoop);
    }

    #[test]
    fn test_escalate_reason() {
        let cli = Cli::try_parse_from(["kaizen", "escalate"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Escalate {
                reason: "manual_trigger".into()
            }
        );

        let cli = Cli::try_parse_from(["kaizen", "escalate", "-r", "disk full"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Escalate {
                reason: "disk full".into()
            }
        );
    }

    #[test]
    fn test_maintenance_commands() {
        assert_eq!(Cli::try_parse_from(["kaizen", "failures"]).unwrap().command, Commands::Failures);
        assert_eq!(Cli::try_parse_from(["kaizen", "retain"]).unwrap().command, Commands::Retain);
        assert_eq!(Cli::try_parse_from(["kaizen", "strategize"]).unwrap().command, Commands::Strategize);
    }

    #[test]
    fn test_help_works() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["kaizen", "--version"]);
        assert!(result.is_err());
    }
}
