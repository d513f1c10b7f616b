//! CLI command definitions for the `switchboard` binary.

pub mod check;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Route chat messages between buses and reactors.
#[derive(Parser)]
#[command(name = "switchboard", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble the hub from a config file and run it until shutdown.
    Run {
        /// Path to the hub config.
        #[arg(short, long, env = "SWITCHBOARD_CONFIG", default_value = "switchboard.toml")]
        config: PathBuf,
    },

    /// Validate a config file and list the components it assembles.
    Check {
        /// Path to the hub config.
        #[arg(short, long, env = "SWITCHBOARD_CONFIG", default_value = "switchboard.toml")]
        config: PathBuf,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_global_flags() {
        let cli = Cli::try_parse_from(["switchboard", "run", "--config", "hub.toml", "-vv", "--otel"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.otel);
        assert!(!cli.quiet);
        match cli.command {
            Commands::Run { config } => assert_eq!(config, PathBuf::from("hub.toml")),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn parses_completions() {
        let cli = Cli::try_parse_from(["switchboard", "completions", "zsh"]).unwrap();
        assert!(matches!(cli.command, Commands::Completions { shell: Shell::Zsh }));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["switchboard", "--quiet"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }
}
