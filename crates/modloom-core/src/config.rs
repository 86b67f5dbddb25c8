//! Locating and loading configuration and manifest files.

use anyhow::{Context, Result};
use dirs::home_dir;
use modloom_schema::{HostManifest, ModManifest, ModloomConfig};
use std::path::{Path, PathBuf};

/// Configuration file name.
pub const CONFIG_FILE: &str = "modloom.toml";

/// The modloom home directory: `$MODLOOM_HOME`, else `~/.modloom`.
/// None if the user's home cannot be resolved.
pub fn try_modloom_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("MODLOOM_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".modloom"))
}

/// Default configuration path: ~/.modloom/modloom.toml
pub fn default_config_path() -> Option<PathBuf> {
    try_modloom_home().map(|home| home.join(CONFIG_FILE))
}

async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Load a configuration file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn load_config(path: &Path) -> Result<ModloomConfig> {
    let text = read(path).await?;
    let config = ModloomConfig::from_toml(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Load `path` if given, else the default configuration file if it exists,
/// else the built-in defaults.
///
/// # Errors
///
/// Returns an error if an explicit path is missing, or if the chosen file
/// cannot be read or parsed.
pub async fn load_config_or_default(path: Option<&Path>) -> Result<ModloomConfig> {
    if let Some(path) = path {
        return load_config(path).await;
    }
    match default_config_path() {
        Some(default) if tokio::fs::try_exists(&default).await.unwrap_or(false) => {
            load_config(&default).await
        }
        _ => {
            tracing::debug!("no configuration file, using defaults");
            Ok(ModloomConfig::default())
        }
    }
}

/// Load a mod manifest (`mod.toml`).
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn load_mod_manifest(path: &Path) -> Result<ModManifest> {
    let text = read(path).await?;
    ModManifest::from_toml(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load a host manifest listing host-provided modules.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn load_host_manifest(path: &Path) -> Result<HostManifest> {
    let text = read(path).await?;
    HostManifest::from_toml(&text).with_context(|| format!("Failed to parse {}", path.display()))
}
