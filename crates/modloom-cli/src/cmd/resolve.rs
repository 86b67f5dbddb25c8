//! Resolve command

use crate::ui::ConsoleReporter;
use anyhow::{Context, Result};
use crossterm::style::Stylize;
use modloom_core::config::{load_config_or_default, load_host_manifest, load_mod_manifest};
use modloom_core::{CancellationToken, DependencyReference, LoaderContext, Reporter};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Flags of the `resolve` command.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Disable the library feed class.
    pub no_libraries: bool,
    /// Disable the mod feed class.
    pub no_mods: bool,
    /// Print every resolution step.
    pub verbose: bool,
}

/// Resolve the manifest's dependencies and print the outcome.
///
/// Returns whether every reachable dependency was resolved.
pub async fn resolve(
    config_path: Option<&Path>,
    manifest_path: &Path,
    host_modules: Option<&Path>,
    options: ResolveOptions,
) -> Result<bool> {
    let mut config = load_config_or_default(config_path).await?;
    if options.no_libraries {
        config.libraries.enabled = false;
    }
    if options.no_mods {
        config.mods.enabled = false;
    }

    let manifest = load_mod_manifest(manifest_path).await?;
    let ctx = LoaderContext::from_config(&config)
        .context("Failed to open package sources")?
        .with_reporter(Arc::new(ConsoleReporter::new(options.verbose)));

    if let Some(path) = host_modules {
        let host = load_host_manifest(path).await?;
        ctx.ingest_host_modules(&host.modules)
            .context("Invalid host module list")?;
    }

    let roots: Vec<Arc<DependencyReference>> = manifest
        .dependencies
        .iter()
        .cloned()
        .map(|dep| Arc::new(DependencyReference::new(dep)))
        .collect();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    eprintln!(
        "{} {} for {}",
        "Resolving".bold(),
        manifest.identity(),
        ctx.manager().compatibility().host()
    );
    let started = Instant::now();
    let report = ctx.resolve(&roots, &cancel).await?;
    ctx.manager().reporter().summary(
        report.resolved.len(),
        "resolved",
        started.elapsed().as_secs_f64(),
    );

    println!();
    for package in &report.resolved {
        println!("  {:<40} {}", package.to_string(), package.origin());
    }
    for missing in &report.unresolved {
        println!("  {} {missing}", "unresolved".red());
    }

    match ctx.load_order(&report.resolved) {
        Ok(layers) => {
            println!();
            println!("{}", "Load order".bold());
            for (i, layer) in layers.iter().enumerate() {
                let names: Vec<String> = layer.iter().map(ToString::to_string).collect();
                println!("  {:>2}. {}", i + 1, names.join(", "));
            }
        }
        Err(e) => eprintln!("{} {e}", "warning:".yellow()),
    }

    Ok(report.is_complete())
}
