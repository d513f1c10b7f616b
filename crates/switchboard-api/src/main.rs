//! Switchboard CLI entry point.
//!
//! Binary name: `switchboard`
//!
//! Parses CLI arguments, loads the hub config, sets up tracing, and
//! dispatches to the command handler.

mod assemble;
mod cli;
mod signal;

use clap::Parser;
use clap_complete::generate;
use switchboard_observe::tracing_setup::{LogLevel, init_tracing, resolve_filter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = LogLevel::from_flags(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(shell, &mut cmd, "switchboard", &mut std::io::stdout());
            Ok(())
        }
        Commands::Check { config } => cli::check::check(&config, level).await,
        Commands::Run { config } => cli::run::run(&config, level, cli.otel).await,
    }
}

/// Install tracing once the config's `log_level` is known.
pub(crate) fn init_logging(level: LogLevel, config_level: Option<&str>, otel: bool) -> anyhow::Result<()> {
    let env = std::env::var("RUST_LOG").ok();
    let filter = resolve_filter(env.as_deref(), level, config_level);
    init_tracing(&filter, otel).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}
