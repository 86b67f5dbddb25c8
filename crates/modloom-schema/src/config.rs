//! The `modloom.toml` configuration schema.
//!
//! ```toml
//! host_target = "net8.0"
//!
//! [libraries]
//! enabled = true
//! [[libraries.sources]]
//! name = "nuget"
//! url = "https://feed.example.com/v3"
//!
//! [mods]
//! enabled = false
//!
//! [[compatibility]]
//! target = "mygame1.0"
//! falls_back_to = ["net8.0"]
//! ```

use crate::error::SchemaError;
use crate::platform::PlatformTarget;
use crate::source::PackageSource;
use serde::{Deserialize, Serialize};

/// Top-level configuration consumed by the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModloomConfig {
    /// Host target override; detected when absent.
    #[serde(default)]
    pub host_target: Option<PlatformTarget>,
    /// Feeds consulted for library dependencies.
    #[serde(default)]
    pub libraries: FeedConfig,
    /// Feeds consulted for mod dependencies.
    #[serde(default)]
    pub mods: FeedConfig,
    /// Extra compatibility edges layered on the built-in graph.
    #[serde(default)]
    pub compatibility: Vec<CompatibilityEdge>,
}

/// One class of feeds (libraries or mods).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Whether dependencies of this class may be resolved from feeds at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Sources in the order they are queried.
    #[serde(default)]
    pub sources: Vec<PackageSource>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sources: Vec::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Declares that `target` can consume builds made for `falls_back_to`,
/// most preferred first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityEdge {
    /// The more specific target.
    pub target: PlatformTarget,
    /// Targets it accepts builds for, in preference order.
    pub falls_back_to: Vec<PlatformTarget>,
}

impl ModloomConfig {
    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] if the text is not a valid configuration.
    pub fn from_toml(text: &str) -> Result<Self, SchemaError> {
        toml::from_str(text).map_err(|source| SchemaError::Parse {
            what: "modloom.toml",
            source,
        })
    }

    /// The host target, falling back to detection.
    pub fn resolved_host_target(&self) -> PlatformTarget {
        self.host_target
            .clone()
            .unwrap_or_else(PlatformTarget::detect_host)
    }
}
