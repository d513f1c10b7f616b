//! `switchboard check` -- validate a config without running it.

use std::fmt::Write as _;
use std::path::Path;

use switchboard_infra::config::load_hub_config;
use switchboard_observe::tracing_setup::LogLevel;
use switchboard_types::config::{ComponentConfig, HubConfig};

use crate::assemble::assemble;

pub async fn check(config_path: &Path, level: LogLevel) -> anyhow::Result<()> {
    let config = load_hub_config(config_path).await?;
    crate::init_logging(level, config.log_level.as_deref(), false)?;

    print!("{}", report(config_path, &config)?);
    Ok(())
}

/// Assemble `config` and render the summary `check` prints.
pub fn report(config_path: &Path, config: &HubConfig) -> anyhow::Result<String> {
    let hub = assemble(config)?;

    let mut out = String::new();
    writeln!(out)?;
    writeln!(
        out,
        "  {} {} assembles cleanly (hub '{}')",
        console::style("✓").green(),
        console::style(config_path.display()).cyan(),
        hub.name()
    )?;
    write_section(&mut out, "buses", config.bus.iter())?;
    write_section(&mut out, "reactors", config.reactor.iter())?;
    writeln!(out)?;
    Ok(out)
}

fn write_section<'a>(
    out: &mut String,
    title: &str,
    components: impl ExactSizeIterator<Item = (&'a String, &'a ComponentConfig)>,
) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "  {} ({})", console::style(title).bold(), components.len())?;
    for (name, component) in components {
        writeln!(out, "    {:<16} {}", name, console::style(&component.kind).dim())?;
    }
    Ok(())
}
