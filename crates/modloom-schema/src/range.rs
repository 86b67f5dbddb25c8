//! Version ranges.
//!
//! Two syntaxes are accepted:
//!
//! - semver requirements: `>=1.0, <2.0`, `^1.2`, `~1.4.2`, `*`
//! - interval notation: `[1.0,2.0)`, `(,2.0]`, `[1.0,)`, `[1.5]`
//!
//! Interval bounds are padded to full `major.minor.patch` before being
//! turned into semver comparators, so `(1.0,2.0)` excludes `1.0.0` only and
//! not the whole `1.0.x` line. A bare version such as `1.2` uses semver
//! caret semantics.

use crate::error::SchemaError;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// A parsed version range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    text: String,
    req: VersionReq,
}

impl VersionRange {
    /// A range that accepts every release version.
    pub fn any() -> Self {
        Self {
            text: "*".to_string(),
            req: VersionReq::STAR,
        }
    }

    /// A range that accepts exactly `version`.
    pub fn exact(version: &Version) -> Self {
        let text = format!("={version}");
        // A formatted semver version is always a valid `=` comparator.
        let req = VersionReq::parse(&text).unwrap_or(VersionReq::STAR);
        Self { text, req }
    }

    /// Parse a range in either semver or interval notation.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidRange`] if the text is neither.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let trimmed = text.trim();
        let invalid = |reason: String| SchemaError::InvalidRange {
            range: text.to_string(),
            reason,
        };

        let req_text = if trimmed.starts_with('[') || trimmed.starts_with('(') {
            interval_to_req(trimmed).map_err(invalid)?
        } else if trimmed.is_empty() {
            "*".to_string()
        } else {
            trimmed.to_string()
        };

        let req = VersionReq::parse(&req_text).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            text: trimmed.to_string(),
            req,
        })
    }

    /// Whether `version` lies inside the range.
    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version)
    }

    /// The underlying semver requirement.
    pub fn as_req(&self) -> &VersionReq {
        &self.req
    }

    /// The range as it was written.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl PartialEq for VersionRange {
    fn eq(&self, other: &Self) -> bool {
        self.req == other.req
    }
}

impl Eq for VersionRange {}

impl std::hash::Hash for VersionRange {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.req.to_string().hash(state);
    }
}

impl std::fmt::Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl std::str::FromStr for VersionRange {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = SchemaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<VersionRange> for String {
    fn from(range: VersionRange) -> Self {
        range.text
    }
}

/// Translate interval notation into a semver requirement string.
fn interval_to_req(text: &str) -> Result<String, String> {
    let open = text.chars().next().ok_or("empty range")?;
    let close = text.chars().last().ok_or("empty range")?;
    if !matches!(close, ']' | ')') {
        return Err("interval must end with ']' or ')'".to_string());
    }
    let inner = &text[1..text.len() - 1];

    // `[1.5]` pins an exact version.
    if !inner.contains(',') {
        if open != '[' || close != ']' || inner.trim().is_empty() {
            return Err("exact version must be written as [x.y.z]".to_string());
        }
        return Ok(format!("={}", pad_version(inner.trim())?));
    }

    let (low, high) = inner.split_once(',').ok_or("missing ','")?;
    if high.contains(',') {
        return Err("too many bounds".to_string());
    }

    let mut comparators = Vec::new();
    if !low.trim().is_empty() {
        let op = if open == '[' { ">=" } else { ">" };
        comparators.push(format!("{op}{}", pad_version(low.trim())?));
    }
    if !high.trim().is_empty() {
        let op = if close == ']' { "<=" } else { "<" };
        comparators.push(format!("{op}{}", pad_version(high.trim())?));
    }

    if comparators.is_empty() {
        Ok("*".to_string())
    } else {
        Ok(comparators.join(", "))
    }
}

/// Pad `1` / `1.2` to `1.0.0` / `1.2.0`; keeps any pre-release suffix.
fn pad_version(v: &str) -> Result<String, String> {
    let (core, suffix) = match v.find(['-', '+']) {
        Some(idx) => v.split_at(idx),
        None => (v, ""),
    };
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.parse::<u64>().is_err()) {
        return Err(format!("'{v}' is not a version"));
    }
    let mut padded: Vec<&str> = parts;
    while padded.len() < 3 {
        padded.push("0");
    }
    Ok(format!("{}{suffix}", padded.join(".")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_semver_range() {
        let r = VersionRange::parse(">=1.0, <2.0").unwrap();
        assert!(r.matches(&v("1.0.0")));
        assert!(r.matches(&v("1.5.0")));
        assert!(!r.matches(&v("2.0.0")));
    }

    #[test]
    fn test_half_open_interval() {
        let r = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(r.matches(&v("1.0.0")));
        assert!(r.matches(&v("1.9.9")));
        assert!(!r.matches(&v("2.0.0")));
    }

    #[test]
    fn test_exclusive_lower_bound_is_padded() {
        let r = VersionRange::parse("(1.0,2.0]").unwrap();
        assert!(!r.matches(&v("1.0.0")));
        assert!(r.matches(&v("1.0.1")));
        assert!(r.matches(&v("2.0.0")));
    }

    #[test]
    fn test_open_ended_intervals() {
        let upper = VersionRange::parse("(,3.0]").unwrap();
        assert!(upper.matches(&v("0.1.0")));
        assert!(!upper.matches(&v("3.0.1")));

        let lower = VersionRange::parse("[2.1,)").unwrap();
        assert!(lower.matches(&v("9.0.0")));
        assert!(!lower.matches(&v("2.0.9")));
    }

    #[test]
    fn test_exact_interval() {
        let r = VersionRange::parse("[1.5]").unwrap();
        assert!(r.matches(&v("1.5.0")));
        assert!(!r.matches(&v("1.5.1")));
    }

    #[test]
    fn test_empty_and_star() {
        assert!(VersionRange::parse("").unwrap().matches(&v("7.0.0")));
        assert!(VersionRange::any().matches(&v("0.0.1")));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(VersionRange::parse("[1.0").is_err());
        assert!(VersionRange::parse("(1.5)").is_err());
        assert!(VersionRange::parse("[a,b)").is_err());
        assert!(VersionRange::parse("not a range").is_err());
    }

    #[test]
    fn test_display_keeps_original_text() {
        let r = VersionRange::parse("[1.0,2.0)").unwrap();
        assert_eq!(r.to_string(), "[1.0,2.0)");
    }
}
