//! Errors raised while constructing or parsing schema values.

use thiserror::Error;

/// Validation and parse failures for schema values.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A package id was empty or contained whitespace.
    #[error("Invalid package id: '{0}'")]
    InvalidId(String),

    /// A version range could not be parsed.
    #[error("Invalid version range '{range}': {reason}")]
    InvalidRange {
        /// The offending range text.
        range: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A platform target moniker was empty or malformed.
    #[error("Invalid platform target: '{0}'")]
    InvalidTarget(String),

    /// A configuration or manifest file was not valid TOML for its schema.
    #[error("Failed to parse {what}: {source}")]
    Parse {
        /// Which document was being parsed (e.g. `modloom.toml`).
        what: &'static str,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}
