//! Sources command

use anyhow::Result;
use crossterm::style::Stylize;
use modloom_core::config::load_config_or_default;
use modloom_schema::FeedConfig;
use std::path::Path;

/// List configured sources per feed class.
pub async fn sources(config_path: Option<&Path>) -> Result<()> {
    let config = load_config_or_default(config_path).await?;
    print_class("libraries", &config.libraries);
    print_class("mods", &config.mods);
    Ok(())
}

fn print_class(kind: &str, feeds: &FeedConfig) {
    let state = if feeds.enabled {
        "enabled".green()
    } else {
        "disabled".red()
    };
    println!("{} ({state})", kind.bold());

    if feeds.sources.is_empty() {
        println!("  {}", "no sources".dark_grey());
    }
    for source in &feeds.sources {
        let auth = if source.is_authenticated() { " [auth]" } else { "" };
        println!(
            "  {:<16} {}{}",
            source.name,
            source.location,
            auth.dark_grey()
        );
    }
}
