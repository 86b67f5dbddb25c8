//! Platform target monikers.

use crate::error::SchemaError;

/// A platform target moniker that a package build is compiled for.
///
/// Targets are opaque to this crate apart from normalization: they are
/// trimmed and lower-cased so `Net8.0` and `net8.0` name the same target.
/// Which targets are compatible with which is decided by the compatibility
/// resolver in `modloom-core`.
///
/// # Example
///
/// ```
/// use modloom_schema::PlatformTarget;
///
/// let host = PlatformTarget::new("NetStandard2.0").unwrap();
/// assert_eq!(host.as_str(), "netstandard2.0");
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformTarget(String);

impl PlatformTarget {
    /// Target used when neither configuration nor environment names one.
    pub const DEFAULT_HOST: &'static str = "net8.0";

    /// Moniker of the target every other target is compatible with.
    pub const ANY: &'static str = "any";

    /// Create a normalized target.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidTarget`] for empty monikers or monikers
    /// containing whitespace or path separators.
    pub fn new(moniker: &str) -> Result<Self, SchemaError> {
        let normalized = moniker.trim().to_lowercase();
        if normalized.is_empty()
            || normalized
                .chars()
                .any(|c| c.is_whitespace() || c == '/' || c == '\\')
        {
            return Err(SchemaError::InvalidTarget(moniker.to_string()));
        }
        Ok(Self(normalized))
    }

    /// The platform-neutral target.
    pub fn any() -> Self {
        Self(Self::ANY.to_string())
    }

    /// Detect the host's own target.
    ///
    /// Honors [`HOST_TARGET_ENV`](crate::HOST_TARGET_ENV) when it holds a
    /// valid moniker, otherwise falls back to [`Self::DEFAULT_HOST`].
    pub fn detect_host() -> Self {
        std::env::var(crate::HOST_TARGET_ENV)
            .ok()
            .and_then(|v| Self::new(&v).ok())
            .unwrap_or_else(|| Self(Self::DEFAULT_HOST.to_string()))
    }

    /// Whether this is the platform-neutral target.
    pub fn is_any(&self) -> bool {
        self.0 == Self::ANY
    }

    /// Return the normalized moniker.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PlatformTarget {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PlatformTarget {
    type Error = SchemaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<PlatformTarget> for String {
    fn from(t: PlatformTarget) -> Self {
        t.0
    }
}
