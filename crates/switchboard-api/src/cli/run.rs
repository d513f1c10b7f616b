//! `switchboard run` -- assemble the hub and run it until shutdown.

use std::path::Path;

use anyhow::Context;
use switchboard_infra::config::load_hub_config;
use switchboard_observe::tracing_setup::{LogLevel, shutdown_tracing};
use tracing::info;

use crate::assemble::assemble;
use crate::signal::cancel_on_signal;

/// Run the hub described by `config_path`.
///
/// A deliberate stop (signal, end of console input, the eject keyword) is a
/// success; any other component failure is returned as an error.
pub async fn run(config_path: &Path, level: LogLevel, otel: bool) -> anyhow::Result<()> {
    let config = load_hub_config(config_path).await?;
    crate::init_logging(level, config.log_level.as_deref(), otel)?;

    let hub = assemble(&config)?;
    info!(
        hub = hub.name(),
        buses = hub.bus_names().count(),
        reactors = hub.reactor_names().count(),
        "starting hub"
    );

    let watcher = cancel_on_signal(hub.cancellation_token());
    let result = hub.run().await;
    watcher.abort();
    shutdown_tracing();

    match result {
        Ok(()) => {
            info!("hub stopped");
            Ok(())
        }
        Err(err) if err.is_shutdown() => {
            info!("hub shut down cleanly");
            Ok(())
        }
        Err(err) => Err(err).context("hub stopped with an error"),
    }
}
