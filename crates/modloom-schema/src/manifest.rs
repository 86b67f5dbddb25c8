//! Manifests describing mods and host-provided modules.
//!
//! A mod manifest (`mod.toml`) names the mod and the packages it depends
//! on. A host manifest lists the modules the host already has loaded, which
//! become pseudo-packages before any resolution starts.

use crate::error::SchemaError;
use crate::platform::PlatformTarget;
use crate::types::{PackageDependency, PackageId, PackageIdentity};
use semver::Version;
use serde::{Deserialize, Serialize};

/// A mod's manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModManifest {
    /// The `[mod]` table.
    #[serde(rename = "mod")]
    pub info: ModInfo,
    /// Declared dependencies, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
}

/// Identity section of a [`ModManifest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModInfo {
    /// Package id of the mod.
    pub id: PackageId,
    /// Version of the mod.
    pub version: Version,
    /// Target the mod is built for.
    #[serde(default = "PlatformTarget::any")]
    pub target: PlatformTarget,
}

impl ModManifest {
    /// Parse a mod manifest.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] if the document does not match the schema.
    pub fn from_toml(text: &str) -> Result<Self, SchemaError> {
        toml::from_str(text).map_err(|source| SchemaError::Parse {
            what: "mod manifest",
            source,
        })
    }

    /// The mod's identity.
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.info.id.clone(), self.info.version.clone())
    }
}

/// A list of host-provided modules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostManifest {
    /// One entry per module the host already has loaded.
    #[serde(default)]
    pub modules: Vec<HostModuleSpec>,
}

/// A host-provided module that mods may depend on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostModuleSpec {
    /// Package id of the module.
    pub id: PackageId,
    /// Version the host ships.
    pub version: Version,
    /// Target the module is built for.
    #[serde(default = "PlatformTarget::any")]
    pub target: PlatformTarget,
    /// Fixed dependency list, possibly empty.
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
}

impl HostModuleSpec {
    /// The module's identity.
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.id.clone(), self.version.clone())
    }
}

impl HostManifest {
    /// Parse a host manifest.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] if the document does not match the schema.
    pub fn from_toml(text: &str) -> Result<Self, SchemaError> {
        toml::from_str(text).map_err(|source| SchemaError::Parse {
            what: "host manifest",
            source,
        })
    }
}
