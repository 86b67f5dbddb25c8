//! Targets command

use anyhow::{Context, Result};
use modloom_core::config::load_config_or_default;
use modloom_core::{CompatibilityGraph, PlatformCompatibility};
use modloom_schema::PlatformTarget;
use std::path::Path;

/// Print the targets compatible with `host` (or the configured host),
/// most specific first.
pub async fn targets(config_path: Option<&Path>, host: Option<&str>) -> Result<()> {
    let config = load_config_or_default(config_path).await?;
    let host = match host {
        Some(moniker) => PlatformTarget::new(moniker).context("Invalid --host target")?,
        None => config.resolved_host_target(),
    };

    let graph = CompatibilityGraph::builtin().with_edges(&config.compatibility);
    let compat = PlatformCompatibility::new(host, &graph);
    for (rank, target) in compat.compatible_targets().iter().enumerate() {
        println!("{rank:>3}  {target}");
    }
    Ok(())
}
